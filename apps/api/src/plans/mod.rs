//! Plan assignment and usage counting for signed-in users.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::tokens::Identity;
use crate::errors::AppError;
use crate::gate::AuthUser;
use crate::models::plan::Plan;
use crate::models::user::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPlanRequest {
    #[serde(default)]
    pub plan_name: String,
    pub count: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AssignPlanResponse {
    pub plan: Plan,
    /// Re-issued so the caller's next requests carry the paid flag.
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementRequest {
    pub plan_id: Uuid,
    pub amount: Option<i32>,
}

fn validate_assign(req: &AssignPlanRequest) -> Result<(), AppError> {
    if req.plan_name.trim().is_empty() {
        return Err(AppError::Validation("planName is required".to_string()));
    }
    if req.count.is_some_and(|c| c < 0) {
        return Err(AppError::Validation("count must be non-negative".to_string()));
    }
    if let (Some(start), Some(end)) = (req.start_time, req.end_time) {
        if end < start {
            return Err(AppError::Validation(
                "endTime must not be before startTime".to_string(),
            ));
        }
    }
    Ok(())
}

/// POST /api/plans/assign
/// Creates a plan for the caller and marks them paid.
pub async fn assign_plan(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(req): Json<AssignPlanRequest>,
) -> Result<(StatusCode, Json<AssignPlanResponse>), AppError> {
    validate_assign(&req)?;

    let mut tx = state.db.begin().await?;
    let plan = sqlx::query_as::<_, Plan>(
        r#"
        INSERT INTO plans (user_id, email, plan_name, count, start_time, end_time)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(identity.id)
    .bind(&identity.email)
    .bind(req.plan_name.trim())
    .bind(req.count.unwrap_or(1))
    .bind(req.start_time)
    .bind(req.end_time)
    .fetch_one(&mut *tx)
    .await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET is_paid = TRUE, plan_start = COALESCE($2, now()), plan_end = $3
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(identity.id)
    .bind(req.start_time)
    .bind(req.end_time)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    tx.commit().await?;

    info!(user_id = %user.id, plan_id = %plan.id, "Plan assigned");
    let token = state.tokens.issue(&Identity::from(&user))?;
    Ok((StatusCode::CREATED, Json(AssignPlanResponse { plan, token })))
}

/// POST /api/plans/increment
pub async fn increment_usage(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(req): Json<IncrementRequest>,
) -> Result<Json<Plan>, AppError> {
    let plan = sqlx::query_as::<_, Plan>(
        "UPDATE plans SET count = count + $3 WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(req.plan_id)
    .bind(identity.id)
    .bind(req.amount.unwrap_or(1))
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Plan {} not found", req.plan_id)))?;
    Ok(Json(plan))
}
