//! AI advisor: personalized guidance, salary projections and budget plans.
//!
//! Every endpoint here is reserved to paid users and admins and goes through
//! the shared `LlmClient`. Answers are never cached.

pub mod budget;
pub mod guidance;
pub mod handlers;
pub mod prompts;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::AppError;

/// Decodes a JSON body, reporting shape errors as 400 rather than axum's 422.
pub(crate) fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, AppError> {
    serde_json::from_value(body)
        .map_err(|e| AppError::Validation(format!("Invalid request data: {e}")))
}
