use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens::Identity;
use crate::errors::AppError;
use crate::models::user::{User, UserSummary};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub other: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserSummary,
    pub token: String,
}

fn require_fields(fields: &[&str]) -> Result<(), AppError> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(AppError::Validation("Missing fields".to_string()));
    }
    Ok(())
}

fn respond(state: &AppState, user: &User) -> Result<AuthResponse, AppError> {
    let token = state.tokens.issue(&Identity::from(user))?;
    Ok(AuthResponse {
        user: UserSummary::from(user),
        token,
    })
}

async fn create_user(
    state: &AppState,
    req: SignupRequest,
    is_admin: bool,
) -> Result<AuthResponse, AppError> {
    require_fields(&[req.name.as_str(), req.email.as_str(), req.password.as_str()])?;
    let email = req.email.trim().to_string();

    let existing: Option<(uuid::Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password(req.password).await?;
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash, is_paid, is_admin, other)
        VALUES ($1, $2, $3, FALSE, $4, $5)
        RETURNING *
        "#,
    )
    .bind(req.name.trim())
    .bind(&email)
    .bind(password_hash)
    .bind(is_admin)
    .bind(req.other)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if e.as_database_error()
            .is_some_and(|db| db.is_unique_violation())
        {
            AppError::Conflict("Email already registered".to_string())
        } else {
            AppError::Database(e)
        }
    })?;

    info!(user_id = %user.id, is_admin, "User registered");
    respond(state, &user)
}

async fn authenticate(
    state: &AppState,
    req: LoginRequest,
    admin_only: bool,
) -> Result<AuthResponse, AppError> {
    require_fields(&[req.email.as_str(), req.password.as_str()])?;

    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE email = $1 AND (NOT $2 OR is_admin)",
    )
    .bind(req.email.trim())
    .bind(admin_only)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(req.password, user.password_hash.clone()).await? {
        return Err(AppError::InvalidCredentials);
    }
    respond(state, &user)
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = create_user(&state, req, false).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(authenticate(&state, req, false).await?))
}

/// POST /api/auth/admin/login
pub async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(authenticate(&state, req, true).await?))
}

/// POST /api/auth/admin/signup
/// Only open when `ALLOW_ADMIN_SIGNUP=true`.
pub async fn admin_signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    if !state.config.allow_admin_signup {
        return Err(AppError::Forbidden("Admin signup is disabled".to_string()));
    }
    let response = create_user(&state, req, true).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
