//! Gemini client. Every AI call in the service goes through `LlmClient`:
//! handlers never build Gemini requests themselves.
//!
//! The model is fixed to `gemini-2.5-flash`.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;
pub mod sse;
#[cfg(test)]
pub mod testing;

use sse::SseDecoder;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// The model used for all LLM calls.
pub const MODEL: &str = "gemini-2.5-flash";
const MAX_RETRIES: u32 = 3;
/// First retry delay; doubles on each further attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Google Cloud console keys (OAuth-only) start with this prefix and are
/// always rejected by the Generative Language API.
const CLOUD_CONSOLE_KEY_PREFIX: &str = "AQ.";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("AI service is not configured: GEMINI_API_KEY is not set")]
    NotConfigured,

    #[error("AI credential rejected (status {status}): {message}")]
    Credential { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("AI response did not parse as the expected format: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Coarse categories callers surface to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    NotConfigured,
    /// The key is missing permissions, invalid, or of the wrong kind.
    Credential,
    /// Transport failures, throttling and 5xx. Retrying later may succeed.
    Upstream,
    /// The model answered but not in the expected structure.
    MalformedResponse,
}

impl LlmErrorKind {
    /// Machine-readable code surfaced in error bodies and SSE error events.
    pub fn code(self) -> &'static str {
        match self {
            LlmErrorKind::NotConfigured => "AI_NOT_CONFIGURED",
            LlmErrorKind::Credential => "AI_CREDENTIAL_REJECTED",
            LlmErrorKind::Upstream => "AI_UPSTREAM_UNAVAILABLE",
            LlmErrorKind::MalformedResponse => "AI_RESPONSE_MALFORMED",
        }
    }
}

impl LlmError {
    pub fn kind(&self) -> LlmErrorKind {
        match self {
            LlmError::NotConfigured => LlmErrorKind::NotConfigured,
            LlmError::Credential { .. } => LlmErrorKind::Credential,
            LlmError::Http(_) | LlmError::Api { .. } | LlmError::RateLimited { .. } => {
                LlmErrorKind::Upstream
            }
            LlmError::Parse(_) | LlmError::EmptyContent => LlmErrorKind::MalformedResponse,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
pub struct ContentPart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl LlmResponse {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

/// The single LLM client used by all services.
/// Wraps the Gemini generateContent API with retry logic and structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    retry_delay: Duration,
}

impl LlmClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
            retry_delay: RETRY_BASE_DELAY,
        }
    }

    /// Points the client at a local server and retries without waiting.
    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.retry_delay = Duration::ZERO;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fails fast when no usable key is configured, without calling out.
    pub fn ensure_credentials(&self) -> Result<(), LlmError> {
        self.api_key().map(|_| ())
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        let key = self.api_key.as_deref().ok_or(LlmError::NotConfigured)?;
        if key.starts_with(CLOUD_CONSOLE_KEY_PREFIX) {
            return Err(LlmError::Credential {
                status: 401,
                message: "the configured key is a Google Cloud console key; \
                          an AI Studio key (starting with \"AIza\") is required"
                    .to_string(),
            });
        }
        Ok(key)
    }

    fn request_body(prompt: &str) -> GenerateRequest<'_> {
        GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        }
    }

    /// Makes a raw call to the Gemini API, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn call(&self, prompt: &str) -> Result<LlmResponse, LlmError> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}:generateContent", self.base_url, MODEL);
        let request_body = Self::request_body(prompt);

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = self.retry_delay * (1 << (attempt - 1));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                return Err(error_from_response(response).await);
            }

            // A 200 whose body is not a Gemini response is a malformed answer,
            // not a transport failure.
            let body = response.text().await?;
            let llm_response: LlmResponse = serde_json::from_str(&body).map_err(|e| {
                let excerpt: String = body.chars().take(500).collect();
                warn!("Undecodable LLM response body (first 500 chars): {excerpt}");
                LlmError::Parse(e)
            })?;

            if let Some(usage) = &llm_response.usage_metadata {
                debug!(
                    "LLM call succeeded: prompt_tokens={}, output_tokens={}",
                    usage.prompt_token_count, usage.candidates_token_count
                );
            }

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Calls the LLM and returns the text of the answer.
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.call(prompt).await?.text().ok_or(LlmError::EmptyContent)
    }

    /// Convenience method that calls the LLM and deserializes the text response as JSON.
    /// The prompt must instruct the model to return valid JSON.
    pub async fn call_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T, LlmError> {
        let text = self.generate(prompt).await?;
        let json = extract_json(&text);
        serde_json::from_str(json).map_err(|e| {
            let excerpt: String = text.chars().take(500).collect();
            warn!("Unparseable LLM output (first 500 chars): {excerpt}");
            LlmError::Parse(e)
        })
    }

    /// Streams the answer as incremental text chunks.
    ///
    /// The returned stream owns the upstream HTTP response; dropping it (for
    /// example when the downstream client disconnects) closes the connection.
    /// Streaming calls are not retried.
    pub async fn call_stream(
        &self,
        prompt: &str,
    ) -> Result<impl Stream<Item = Result<String, LlmError>>, LlmError> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}:streamGenerateContent?alt=sse", self.base_url, MODEL);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&Self::request_body(prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let mut body = Box::pin(response.bytes_stream());

        Ok(async_stream::try_stream! {
            let mut decoder = SseDecoder::default();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(LlmError::Http)?;
                for data in decoder.push(&chunk) {
                    let piece: LlmResponse = serde_json::from_str(&data).map_err(LlmError::Parse)?;
                    if let Some(text) = piece.text() {
                        yield text;
                    }
                }
            }
        })
    }
}

async fn error_from_response(response: Response) -> LlmError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    // Try to parse error message
    let message = serde_json::from_str::<GeminiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    match status {
        401 | 403 => LlmError::Credential { status, message },
        429 => LlmError::RateLimited { retries: 0 },
        _ => LlmError::Api { status, message },
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Pulls the JSON document out of an LLM answer: drops code fences, then any
/// prose before the first `{`/`[` and after the matching last `}`/`]`.
pub fn extract_json(text: &str) -> &str {
    let text = strip_json_fences(text);
    let Some(start) = text.find(|c| c == '{' || c == '[') else {
        return text;
    };
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    match text.rfind(close) {
        Some(end) if end > start => &text[start..=end],
        _ => text,
    }
}
