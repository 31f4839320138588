use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::advisor::budget::{settle_budget, BudgetPlan, BudgetProposal, BudgetRequest};
use crate::advisor::guidance::{normalize_guidance, GuidanceRequest};
use crate::advisor::{parse_body, prompts};
use crate::errors::AppError;
use crate::gate::PaidAccess;
use crate::llm_client::LlmError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryQuery {
    pub career_name: Option<String>,
}

fn guidance_request(body: Value) -> Result<GuidanceRequest, AppError> {
    let req: GuidanceRequest = parse_body(body)?;
    req.validate()?;
    Ok(req)
}

/// POST /api/ai/guidance
pub async fn guidance(
    State(state): State<AppState>,
    PaidAccess(_): PaidAccess,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let req = guidance_request(body)?;
    let answer: Value = state.llm.call_json(&prompts::guidance(&req)).await?;
    Ok(Json(normalize_guidance(answer)?))
}

fn content_event(text: &str) -> Event {
    Event::default().data(json!({ "content": text }).to_string())
}

fn error_event(e: &LlmError) -> Event {
    let body = json!({ "error": e.to_string(), "code": e.kind().code() });
    Event::default().data(body.to_string())
}

/// POST /api/ai/guidance/stream
///
/// One `{"content"}` event per model chunk, then `[DONE]`. An upstream failure
/// ends the stream with a single `{"error", "code"}` event. Configuration
/// problems are reported before the stream opens, as a normal error response.
pub async fn guidance_stream(
    State(state): State<AppState>,
    PaidAccess(_): PaidAccess,
    Json(body): Json<Value>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let req = guidance_request(body)?;
    state.llm.ensure_credentials()?;

    let llm = state.llm.clone();
    let prompt = prompts::guidance_stream(&req);
    let events = async_stream::stream! {
        let chunks = match llm.call_stream(&prompt).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "Guidance stream failed to start");
                yield error_event(&e);
                return;
            }
        };
        futures_util::pin_mut!(chunks);
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(text) => yield content_event(&text),
                Err(e) => {
                    warn!(error = %e, "Guidance stream interrupted");
                    yield error_event(&e);
                    return;
                }
            }
        }
        yield Event::default().data("[DONE]");
    };

    Ok(Sse::new(events.map(Ok::<_, Infallible>)).keep_alive(KeepAlive::default()))
}

/// GET /api/ai/salary-insights/:career_id?careerName=
pub async fn salary_insights(
    State(state): State<AppState>,
    PaidAccess(_): PaidAccess,
    Path(career_id): Path<String>,
    Query(query): Query<SalaryQuery>,
) -> Result<Json<Vec<Value>>, AppError> {
    let career = query
        .career_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(career_id.as_str());

    // Anything but a JSON array (a refusal object, prose) is a malformed answer.
    let insights: Vec<Value> = state.llm.call_json(&prompts::salary_insights(career)).await?;
    Ok(Json(insights))
}

/// POST /api/budget/calculate
/// POST /api/budget/recommendations
pub async fn calculate_budget(
    State(state): State<AppState>,
    PaidAccess(_): PaidAccess,
    Json(body): Json<Value>,
) -> Result<Json<BudgetPlan>, AppError> {
    let req: BudgetRequest = parse_body(body)?;
    req.validate()?;

    let proposal: BudgetProposal = state.llm.call_json(&prompts::budget(&req)).await?;
    let plan = settle_budget(&req, proposal);
    info!(
        budget_type = req.budget_type.as_str(),
        colleges = plan.colleges.len(),
        pgs = plan.pgs.len(),
        packages = plan.recommendations.len(),
        "Budget plan settled"
    );
    Ok(Json(plan))
}
