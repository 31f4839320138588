use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::cache::CacheStats;
use crate::errors::AppError;
use crate::models::catalog::{Career, Coaching, College, Level, Stream};
use crate::models::user::UserSummary;
use crate::state::AppState;

const PREMIUM_PLAN_NAME: &str = "Premium Subscription";

fn require_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    Ok(name)
}

fn map_constraint_error(e: sqlx::Error, what: &str) -> AppError {
    let (foreign_key, unique) = match e.as_database_error() {
        Some(db) => (db.is_foreign_key_violation(), db.is_unique_violation()),
        None => (false, false),
    };
    if foreign_key {
        AppError::Validation(format!("{what} references a record that does not exist"))
    } else if unique {
        AppError::Conflict(format!("{what} already exists"))
    } else {
        AppError::Database(e)
    }
}

// ---- users ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetUserPaidRequest {
    /// Older clients send the email under `userId`.
    #[serde(alias = "userId")]
    pub email: String,
    pub is_paid: bool,
    pub plan_start: Option<DateTime<Utc>>,
    pub plan_end: Option<DateTime<Utc>>,
}

/// POST /api/admin/user/paid
pub async fn set_user_paid(
    State(state): State<AppState>,
    Json(req): Json<SetUserPaidRequest>,
) -> Result<Json<UserSummary>, AppError> {
    let mut tx = state.db.begin().await?;

    let user = sqlx::query_as::<_, UserSummary>(
        r#"
        UPDATE users SET is_paid = $2, plan_start = $3, plan_end = $4
        WHERE email = $1
        RETURNING id, email, name, is_paid, is_admin, plan_start, plan_end
        "#,
    )
    .bind(req.email.trim())
    .bind(req.is_paid)
    .bind(req.plan_start)
    .bind(req.plan_end)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if req.is_paid {
        sqlx::query(
            r#"
            INSERT INTO plans (user_id, email, plan_name, count, start_time, end_time)
            VALUES ($1, $2, $3, 1, COALESCE($4, now()), $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(PREMIUM_PLAN_NAME)
        .bind(req.plan_start)
        .bind(req.plan_end)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(user_id = %user.id, is_paid = req.is_paid, "Admin updated paid status");
    Ok(Json(user))
}

// ---- careers ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertCareerRequest {
    pub name: String,
    pub description: Option<String>,
    pub stream: Option<Stream>,
    pub level: Level,
    #[serde(default)]
    pub is_paid: bool,
}

/// POST /api/admin/career/upsert
pub async fn upsert_career(
    State(state): State<AppState>,
    Json(req): Json<UpsertCareerRequest>,
) -> Result<Json<Career>, AppError> {
    let name = require_name(&req.name)?;
    let career = sqlx::query_as::<_, Career>(
        r#"
        INSERT INTO careers (name, description, stream, level, is_paid)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (name) DO UPDATE SET
            description = EXCLUDED.description,
            stream = EXCLUDED.stream,
            level = EXCLUDED.level,
            is_paid = EXCLUDED.is_paid,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(&req.description)
    .bind(req.stream.map(|s| s.as_str()))
    .bind(req.level.as_str())
    .bind(req.is_paid)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(career))
}

/// GET /api/admin/career
pub async fn list_careers(State(state): State<AppState>) -> Result<Json<Vec<Career>>, AppError> {
    let careers = sqlx::query_as::<_, Career>("SELECT * FROM careers ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(careers))
}

/// Accepts `1500000` as well as `"1500000"`.
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
pub struct InsightInput {
    pub year: i32,
    #[serde(deserialize_with = "number_or_string")]
    pub min: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub avg: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub max: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceInsightsRequest {
    pub career_id: Uuid,
    #[serde(default)]
    pub insights: Vec<InsightInput>,
}

fn validate_insights(insights: &[InsightInput]) -> Result<(), AppError> {
    for i in insights {
        if i.year < 0 {
            return Err(AppError::Validation(format!(
                "year must be non-negative (got {})",
                i.year
            )));
        }
        if !(i.min <= i.avg && i.avg <= i.max) {
            return Err(AppError::Validation(format!(
                "year {}: expected min <= avg <= max",
                i.year
            )));
        }
    }
    Ok(())
}

/// POST /api/admin/career/salary-insights
/// Replaces every insight of the career in one transaction.
pub async fn replace_salary_insights(
    State(state): State<AppState>,
    Json(req): Json<ReplaceInsightsRequest>,
) -> Result<Json<Value>, AppError> {
    validate_insights(&req.insights)?;

    let mut tx = state.db.begin().await?;
    sqlx::query("DELETE FROM salary_insights WHERE career_id = $1")
        .bind(req.career_id)
        .execute(&mut *tx)
        .await?;
    for insight in &req.insights {
        sqlx::query(
            r#"
            INSERT INTO salary_insights (career_id, year, min_salary, avg_salary, max_salary)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(req.career_id)
        .bind(insight.year)
        .bind(insight.min)
        .bind(insight.avg)
        .bind(insight.max)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_constraint_error(e, "Salary insight"))?;
    }
    tx.commit().await?;

    Ok(Json(json!({ "success": true })))
}

// ---- colleges ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertCollegeRequest {
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub stream: Option<String>,
    #[serde(default)]
    pub courses: Vec<String>,
    pub fees: Option<f64>,
    #[serde(default)]
    pub is_paid: bool,
}

/// POST /api/admin/college/upsert
pub async fn upsert_college(
    State(state): State<AppState>,
    Json(req): Json<UpsertCollegeRequest>,
) -> Result<Json<College>, AppError> {
    let name = require_name(&req.name)?;
    let college = sqlx::query_as::<_, College>(
        r#"
        INSERT INTO colleges
            (name, description, website, address, city, state, pincode, phone, email,
             stream, courses, fees, is_paid)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (name) DO UPDATE SET
            description = EXCLUDED.description,
            website = EXCLUDED.website,
            address = EXCLUDED.address,
            city = EXCLUDED.city,
            state = EXCLUDED.state,
            pincode = EXCLUDED.pincode,
            phone = EXCLUDED.phone,
            email = EXCLUDED.email,
            stream = EXCLUDED.stream,
            courses = EXCLUDED.courses,
            fees = EXCLUDED.fees,
            is_paid = EXCLUDED.is_paid,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(&req.description)
    .bind(&req.website)
    .bind(&req.address)
    .bind(&req.city)
    .bind(&req.state)
    .bind(&req.pincode)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(&req.stream)
    .bind(&req.courses)
    .bind(req.fees)
    .bind(req.is_paid)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(college))
}

/// DELETE /api/admin/college/:id
pub async fn delete_college(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let result = sqlx::query("DELETE FROM colleges WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("College {id} not found")));
    }
    Ok(Json(json!({ "ok": true })))
}

// ---- coaching ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertCoachingRequest {
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Career the center prepares for. Older clients send it as `courses`.
    #[serde(alias = "courses")]
    pub career_id: Option<Uuid>,
    #[serde(default)]
    pub is_paid: bool,
}

/// POST /api/admin/coaching/upsert
/// Upserts by name and replaces the center's career link.
pub async fn upsert_coaching(
    State(state): State<AppState>,
    Json(req): Json<UpsertCoachingRequest>,
) -> Result<Json<Coaching>, AppError> {
    let name = require_name(&req.name)?;
    let mut tx = state.db.begin().await?;

    let coaching = sqlx::query_as::<_, Coaching>(
        r#"
        INSERT INTO coaching
            (name, description, website, address, city, state, pincode, phone, email, is_paid)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (name) DO UPDATE SET
            description = EXCLUDED.description,
            website = EXCLUDED.website,
            address = EXCLUDED.address,
            city = EXCLUDED.city,
            state = EXCLUDED.state,
            pincode = EXCLUDED.pincode,
            phone = EXCLUDED.phone,
            email = EXCLUDED.email,
            is_paid = EXCLUDED.is_paid,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(&req.description)
    .bind(&req.website)
    .bind(&req.address)
    .bind(&req.city)
    .bind(&req.state)
    .bind(&req.pincode)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(req.is_paid)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM career_coaching WHERE coaching_id = $1")
        .bind(coaching.id)
        .execute(&mut *tx)
        .await?;
    if let Some(career_id) = req.career_id {
        sqlx::query("INSERT INTO career_coaching (career_id, coaching_id) VALUES ($1, $2)")
            .bind(career_id)
            .bind(coaching.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_constraint_error(e, "Coaching link"))?;
    }

    tx.commit().await?;
    Ok(Json(coaching))
}

/// DELETE /api/admin/coaching/:id
pub async fn delete_coaching(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let result = sqlx::query("DELETE FROM coaching WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Coaching center {id} not found")));
    }
    Ok(Json(json!({ "ok": true })))
}

// ---- stats ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: i64,
    pub paid_users: i64,
    pub unpaid_users: i64,
    pub total_plans: i64,
    pub cache: CacheStats,
}

/// GET /api/admin/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<AdminStats>, AppError> {
    let (total_users, paid_users): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_paid) FROM users",
    )
    .fetch_one(&state.db)
    .await?;
    let (total_plans,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM plans")
        .fetch_one(&state.db)
        .await?;

    Ok(Json(AdminStats {
        total_users,
        paid_users,
        unpaid_users: total_users - paid_users,
        total_plans,
        cache: state.cache.stats(),
    }))
}
