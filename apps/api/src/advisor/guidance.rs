use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::llm_client::LlmError;

const DEFAULT_STREAM: &str = "Science";
const DEFAULT_STREAM_REASON: &str = "Based on your profile analysis";

/// Sections of a guidance answer that must always be arrays.
const LIST_SECTIONS: [&str; 5] = ["careers", "colleges", "coaching", "pgs", "recommendations"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceRequest {
    pub interests: Vec<String>,
    pub strengths: Vec<String>,
    pub goals: Vec<String>,
    pub budget: Option<f64>,
    pub location: Option<String>,
}

impl GuidanceRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.budget.is_some_and(|b| !(b.is_finite() && b > 0.0)) {
            return Err(AppError::Validation("budget must be positive".to_string()));
        }
        Ok(())
    }

    pub fn location_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(fallback)
    }
}

/// Brings a model answer into the documented shape: a missing or non-string
/// stream gets the default, and any section that is not an array becomes `[]`.
/// Anything other than a JSON object is rejected.
pub fn normalize_guidance(answer: Value) -> Result<Value, LlmError> {
    let mut answer: Map<String, Value> = serde_json::from_value(answer)?;

    default_text(&mut answer, "recommendedStream", DEFAULT_STREAM);
    default_text(&mut answer, "streamReason", DEFAULT_STREAM_REASON);
    for section in LIST_SECTIONS {
        if !answer.get(section).is_some_and(Value::is_array) {
            answer.insert(section.to_string(), Value::Array(Vec::new()));
        }
    }
    Ok(Value::Object(answer))
}

fn default_text(answer: &mut Map<String, Value>, field: &str, default: &str) {
    let present = answer
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if !present {
        answer.insert(field.to_string(), Value::String(default.to_string()));
    }
}
