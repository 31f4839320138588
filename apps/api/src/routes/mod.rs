pub mod health;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::admin::handlers as admin;
use crate::advisor::handlers as advisor;
use crate::auth::handlers as auth;
use crate::catalog::handlers as catalog;
use crate::gate::access::{classify_request, require_admin};
use crate::gate::invalidation::invalidate_on_mutation;
use crate::plans;
use crate::state::AppState;

fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/user/paid", post(admin::set_user_paid))
        .route("/career", get(admin::list_careers))
        .route("/career/upsert", post(admin::upsert_career))
        .route("/career/salary-insights", post(admin::replace_salary_insights))
        .route("/college/upsert", post(admin::upsert_college))
        .route("/college/:id", delete(admin::delete_college))
        .route("/coaching/upsert", post(admin::upsert_coaching))
        .route("/coaching/:id", delete(admin::delete_coaching))
        .route("/stats", get(admin::stats))
        // Outermost last: admins are checked before anything is flushed.
        .layer(middleware::from_fn_with_state(
            state.cache.clone(),
            invalidate_on_mutation,
        ))
        .layer(middleware::from_fn(require_admin))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_handler))
        // Identity
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/admin/login", post(auth::admin_login))
        .route("/api/auth/admin/signup", post(auth::admin_signup))
        // Catalog (gated)
        .route("/api/careers/class10", get(catalog::class10_careers))
        .route("/api/streams", get(catalog::list_streams))
        .route("/api/colleges", get(catalog::list_colleges))
        .route(
            "/api/coaching/career/:career_id",
            get(catalog::coaching_for_career),
        )
        .route("/api/coaching/:id", get(catalog::coaching_detail))
        .route("/api/coaching/:id/pgs", get(catalog::nearby_pgs))
        .route("/api/streams/:stream/careers", get(catalog::stream_careers))
        .route(
            "/api/streams/:stream/careers2/:career_id",
            get(catalog::stream_career_detail),
        )
        // Catalog (open)
        .route("/api/careers/:id", get(catalog::career_by_id))
        .route(
            "/api/careers/:id/salary-insights",
            get(catalog::career_salary_insights),
        )
        .route("/api/streams/:stream", get(catalog::stream_details))
        .route(
            "/api/streams/:stream/careers/:career_id",
            get(catalog::stream_career_insights),
        )
        .route(
            "/api/streams/:stream/careers/:career_id/salary-insights",
            get(catalog::stream_career_salary_insights),
        )
        // Plans
        .route("/api/plans/assign", post(plans::assign_plan))
        .route("/api/plans/increment", post(plans::increment_usage))
        // Advisor
        .route("/api/ai/guidance", post(advisor::guidance))
        .route("/api/ai/guidance/stream", post(advisor::guidance_stream))
        .route(
            "/api/ai/salary-insights/:career_id",
            get(advisor::salary_insights),
        )
        .route("/api/budget/calculate", post(advisor::calculate_budget))
        .route("/api/budget/recommendations", post(advisor::calculate_budget))
        .nest("/api/admin", admin_routes(&state))
        .layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            classify_request,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::auth::{Identity, TokenKeys};
    use crate::cache::{MemoryCache, ResponseCache, DEFAULT_TTL};
    use crate::catalog::testing::{career, FakeCatalog};
    use crate::config::Config;
    use crate::gate::fallbacks;
    use crate::llm_client::testing::{FakeGemini, Reply};
    use crate::llm_client::LlmClient;
    use crate::models::catalog::Level;

    struct Harness {
        app: Router,
        catalog: Arc<FakeCatalog>,
        cache: ResponseCache,
        tokens: TokenKeys,
    }

    fn harness() -> Harness {
        harness_with_llm(LlmClient::new(None))
    }

    fn harness_with_llm(llm: LlmClient) -> Harness {
        let config = Config::for_tests();
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let catalog = Arc::new(FakeCatalog {
            careers: vec![
                career("Electrician", Level::Class10, None, false),
                career("Pilot", Level::Class10, None, true),
            ],
            ..FakeCatalog::default()
        });
        let cache = ResponseCache::new(Arc::new(MemoryCache::new()), DEFAULT_TTL);
        let tokens = TokenKeys::new(&config.jwt_secret, config.token_ttl_hours);
        let state = AppState::with_catalog(
            db,
            catalog.clone(),
            cache.clone(),
            llm,
            config,
        );
        Harness {
            app: build_router(state),
            catalog,
            cache,
            tokens,
        }
    }

    fn bearer(tokens: &TokenKeys, is_paid: bool, is_admin: bool) -> String {
        let token = tokens
            .issue(&Identity {
                id: Uuid::new_v4(),
                email: "student@example.com".into(),
                is_paid,
                is_admin,
            })
            .unwrap();
        format!("Bearer {token}")
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let response = send(&h.app, "GET", "/api/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["cache"], "memory");
        assert_eq!(body["ai"], false);
    }

    #[tokio::test]
    async fn test_anonymous_streams_get_fixed_list() {
        let h = harness();
        let response = send(&h.app, "GET", "/api/streams", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, fallbacks::streams());
        assert_eq!(h.catalog.calls(), 0);
    }

    #[tokio::test]
    async fn test_paid_class10_hits_catalog_once() {
        let h = harness();
        let auth = bearer(&h.tokens, true, false);

        let first = send(&h.app, "GET", "/api/careers/class10", Some(&auth), None).await;
        assert_eq!(first.status(), StatusCode::OK);
        let first = json_body(first).await;
        let second = send(&h.app, "GET", "/api/careers/class10", Some(&auth), None).await;
        let second = json_body(second).await;

        assert_eq!(first, second);
        assert_eq!(first.as_array().map(Vec::len), Some(2));
        assert_eq!(h.catalog.calls(), 1);
        assert!(h.cache.get("paid:class10-paid").await.is_some());
    }

    #[tokio::test]
    async fn test_free_class10_only_lists_free_careers() {
        let h = harness();
        let auth = bearer(&h.tokens, false, false);
        let response = send(&h.app, "GET", "/api/careers/class10", Some(&auth), None).await;
        let body = json_body(response).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["name"], "Electrician");
        assert!(h.cache.get("free:class10-free").await.is_some());
    }

    #[tokio::test]
    async fn test_bad_token_reads_as_anonymous_on_gated_routes() {
        let h = harness();
        let uri = format!("/api/coaching/{}/pgs", Uuid::new_v4());
        let response = send(&h.app, "GET", &uri, Some("Bearer not-a-jwt"), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error"]["code"], "RESTRICTED");
    }

    #[tokio::test]
    async fn test_unknown_stream_is_bad_request() {
        let h = harness();
        let response = send(&h.app, "GET", "/api/streams/Music", None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_routes_reject_before_flushing() {
        let h = harness();
        h.cache.set("paid:class10-paid", &json!(["cached"])).await;
        let body = Some(json!({"name": "Pilot"}));

        let anonymous = send(&h.app, "POST", "/api/admin/career/upsert", None, body.clone()).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let user = bearer(&h.tokens, true, false);
        let forbidden = send(&h.app, "POST", "/api/admin/career/upsert", Some(&user), body).await;
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        assert!(h.cache.get("paid:class10-paid").await.is_some());
    }

    #[tokio::test]
    async fn test_advisor_requires_paid_plan() {
        let h = harness();
        let body = Some(json!({"interests": [], "strengths": [], "goals": []}));

        let free = bearer(&h.tokens, false, false);
        let response = send(&h.app, "POST", "/api/ai/guidance", Some(&free), body.clone()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error"]["code"], "PAID_PLAN_REQUIRED");

        let paid = bearer(&h.tokens, true, false);
        let response = send(&h.app, "POST", "/api/ai/guidance/stream", Some(&paid), body).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["error"]["code"], "AI_NOT_CONFIGURED");
    }

    #[tokio::test]
    async fn test_salary_insights_returns_model_array() {
        let gemini = FakeGemini::start(vec![Reply::answer(
            r#"[{"year": 0, "min": 300000, "avg": 450000, "max": 600000}]"#,
        )])
        .await;
        let h = harness_with_llm(gemini.client());
        let paid = bearer(&h.tokens, true, false);
        let response = send(
            &h.app,
            "GET",
            "/api/ai/salary-insights/pilot?careerName=Pilot",
            Some(&paid),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["avg"], 450000);
    }

    #[tokio::test]
    async fn test_salary_insights_non_array_answer_is_malformed() {
        let gemini = FakeGemini::start(vec![Reply::answer(
            r#"{"error": "I cannot provide salary data for that career."}"#,
        )])
        .await;
        let h = harness_with_llm(gemini.client());
        let paid = bearer(&h.tokens, true, false);
        let response = send(&h.app, "GET", "/api/ai/salary-insights/pilot", Some(&paid), None).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["error"]["code"], "AI_RESPONSE_MALFORMED");
    }

    #[tokio::test]
    async fn test_budget_validation_precedes_ai_call() {
        let h = harness();
        let admin = bearer(&h.tokens, false, true);
        let response = send(
            &h.app,
            "POST",
            "/api/budget/calculate",
            Some(&admin),
            Some(json!({"budgetType": "Both", "totalBudget": -1})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_plans_require_identity() {
        let h = harness();
        let response = send(
            &h.app,
            "POST",
            "/api/plans/assign",
            None,
            Some(json!({"planName": "Premium"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
