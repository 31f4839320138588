use std::future::Future;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::catalog::{CareerFilter, Visibility};
use crate::errors::AppError;
use crate::gate::{Access, GateDecision, GatedRoute};
use crate::models::catalog::{Career, CareerOverview, Level, SalaryInsight, Stream};
use crate::state::AppState;

const COLLEGE_LIST_LIMIT: i64 = 100;

/// Runs the gate for `route`. On `Proceed`, computes the full result, writes
/// it back under the gate's tag and returns it.
async fn gated<T, F, Fut>(
    state: &AppState,
    route: GatedRoute,
    access: &Access,
    compute: F,
) -> Result<Response, AppError>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let tag = match state.gate.check(&route, access).await? {
        GateDecision::ShortCircuit(short) => return Ok(short.into_response()),
        GateDecision::Proceed(tag) => tag,
    };
    let payload = compute().await?;
    state.gate.write_back(tag, &payload).await;
    Ok(Json(payload).into_response())
}

fn parse_stream(raw: &str) -> Result<Stream, AppError> {
    raw.parse().map_err(AppError::Validation)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamListing {
    pub name: Stream,
    pub description: &'static str,
    pub subjects: [&'static str; 3],
    pub careers: Vec<Career>,
}

fn group_by_stream(careers: Vec<Career>) -> Vec<StreamListing> {
    let mut listings: Vec<StreamListing> = Stream::ALL
        .iter()
        .map(|s| StreamListing {
            name: *s,
            description: s.description(),
            subjects: s.core_subjects(),
            careers: Vec::new(),
        })
        .collect();
    for career in careers {
        let Some(stream) = career.stream.as_deref().and_then(|s| s.parse::<Stream>().ok()) else {
            continue;
        };
        if let Some(listing) = listings.iter_mut().find(|l| l.name == stream) {
            listing.careers.push(career);
        }
    }
    listings
}

// ---- gated ----

/// GET /api/careers/class10
pub async fn class10_careers(
    State(state): State<AppState>,
    access: Access,
) -> Result<Response, AppError> {
    let catalog = state.catalog.clone();
    gated(&state, GatedRoute::Class10Careers, &access, || async move {
        catalog
            .careers_with_insights(CareerFilter::level(Level::Class10, Visibility::All))
            .await
    })
    .await
}

/// GET /api/streams
pub async fn list_streams(
    State(state): State<AppState>,
    access: Access,
) -> Result<Response, AppError> {
    let catalog = state.catalog.clone();
    gated(&state, GatedRoute::Streams, &access, || async move {
        let careers = catalog
            .careers(CareerFilter {
                level: Some(Level::Stream),
                stream: None,
                visibility: Visibility::All,
            })
            .await?;
        Ok(group_by_stream(careers))
    })
    .await
}

/// GET /api/colleges
pub async fn list_colleges(
    State(state): State<AppState>,
    access: Access,
) -> Result<Response, AppError> {
    let catalog = state.catalog.clone();
    gated(&state, GatedRoute::Colleges, &access, || async move {
        catalog.colleges(COLLEGE_LIST_LIMIT).await
    })
    .await
}

/// GET /api/coaching/career/:career_id
pub async fn coaching_for_career(
    State(state): State<AppState>,
    Path(career_id): Path<Uuid>,
    access: Access,
) -> Result<Response, AppError> {
    let catalog = state.catalog.clone();
    let route = GatedRoute::CoachingForCareer { career_id };
    gated(&state, route, &access, || async move {
        catalog.coaching_for_career(career_id).await
    })
    .await
}

/// GET /api/coaching/:id
pub async fn coaching_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    access: Access,
) -> Result<Response, AppError> {
    let catalog = state.catalog.clone();
    gated(&state, GatedRoute::CoachingDetail { id }, &access, || async move {
        catalog
            .coaching_detail(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Coaching center not found".to_string()))
    })
    .await
}

/// GET /api/coaching/:id/pgs
pub async fn nearby_pgs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    access: Access,
) -> Result<Response, AppError> {
    let catalog = state.catalog.clone();
    gated(&state, GatedRoute::CoachingPgs { id }, &access, || async move {
        catalog
            .nearby_pgs(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Coaching center not found".to_string()))
    })
    .await
}

/// GET /api/streams/:stream/careers
pub async fn stream_careers(
    State(state): State<AppState>,
    Path(stream): Path<String>,
    access: Access,
) -> Result<Response, AppError> {
    let stream = parse_stream(&stream)?;
    let catalog = state.catalog.clone();
    gated(&state, GatedRoute::StreamCareers { stream }, &access, || async move {
        catalog
            .careers(CareerFilter::stream(stream, Visibility::All).with_level(Level::Stream))
            .await
    })
    .await
}

/// GET /api/streams/:stream/careers2/:career_id
pub async fn stream_career_detail(
    State(state): State<AppState>,
    Path((stream, career_id)): Path<(String, Uuid)>,
    access: Access,
) -> Result<Response, AppError> {
    parse_stream(&stream)?;
    let catalog = state.catalog.clone();
    let route = GatedRoute::StreamCareerDetail { career_id };
    gated(&state, route, &access, || async move {
        catalog
            .career_detail(career_id, Visibility::All)
            .await?
            .ok_or_else(|| AppError::NotFound("Career not found".to_string()))
    })
    .await
}

// ---- ungated ----

/// GET /api/careers/:id
pub async fn career_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CareerOverview>, AppError> {
    let career = state
        .catalog
        .career_overview(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Career not found".to_string()))?;
    Ok(Json(career))
}

/// GET /api/careers/:id/salary-insights
pub async fn career_salary_insights(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SalaryInsight>>, AppError> {
    Ok(Json(state.catalog.salary_insights(id).await?))
}

/// GET /api/streams/:stream
pub async fn stream_details(Path(stream): Path<String>) -> Result<Json<Value>, AppError> {
    let stream = parse_stream(&stream)?;
    Ok(Json(json!({
        "stream": stream,
        "description": stream.description(),
    })))
}

/// GET /api/streams/:stream/careers/:career_id
pub async fn stream_career_insights(
    State(state): State<AppState>,
    Path((stream, career_id)): Path<(String, Uuid)>,
) -> Result<Json<Value>, AppError> {
    parse_stream(&stream)?;
    let salary_insights = state.catalog.salary_insights(career_id).await?;
    Ok(Json(json!({ "salaryInsights": salary_insights })))
}

/// GET /api/streams/:stream/careers/:career_id/salary-insights
pub async fn stream_career_salary_insights(
    State(state): State<AppState>,
    Path((stream, career_id)): Path<(String, Uuid)>,
) -> Result<Json<Vec<SalaryInsight>>, AppError> {
    parse_stream(&stream)?;
    Ok(Json(state.catalog.salary_insights(career_id).await?))
}
