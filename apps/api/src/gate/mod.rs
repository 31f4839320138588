//! Paywall gate: decides, per gated route and caller tier, whether a request
//! is answered from the cache, a fallback, a 403, or by the handler.
//!
//! Flow for a gated handler:
//!
//! 1. `ResponseGate::check` with the route and the caller's `Access`.
//! 2. `ShortCircuit` goes straight back to the client.
//! 3. `Proceed(tag)`: the handler computes the full result, calls
//!    `write_back(tag, &result)`, then returns it.
//!
//! Nothing is locked between the miss and the write-back, so two concurrent
//! paid misses both compute and the last write wins.

use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::ResponseCache;
use crate::catalog::{CareerFilter, CatalogStore, Visibility};
use crate::errors::AppError;
use crate::models::catalog::Level;

pub mod access;
pub mod fallbacks;
pub mod invalidation;
pub mod routes;

pub use access::{Access, AuthUser, Entitlement, PaidAccess};
pub use routes::{FreePolicy, GatedRoute};

/// Where a handler must store its result. Empty when the cache is disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a cache tag must be passed to write_back"]
pub struct CacheTag(Option<String>);

impl CacheTag {
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn key(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShortCircuit {
    Payload(Value),
    Forbidden,
}

impl IntoResponse for ShortCircuit {
    fn into_response(self) -> Response {
        match self {
            ShortCircuit::Payload(value) => Json(value).into_response(),
            ShortCircuit::Forbidden => AppError::Restricted.into_response(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    ShortCircuit(ShortCircuit),
    Proceed(CacheTag),
}

#[derive(Clone)]
pub struct ResponseGate {
    cache: ResponseCache,
    catalog: Arc<dyn CatalogStore>,
}

impl ResponseGate {
    pub fn new(cache: ResponseCache, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { cache, catalog }
    }

    pub async fn check(
        &self,
        route: &GatedRoute,
        access: &Access,
    ) -> Result<GateDecision, AppError> {
        if access.tier().has_paid_access() {
            if !self.cache.is_enabled() {
                return Ok(GateDecision::Proceed(CacheTag::empty()));
            }
            let key = route.paid_key();
            if let Some(cached) = self.cache.get(&key).await {
                debug!(key = %key, tier = ?access.tier(), "gate: serving cached paid response");
                return Ok(GateDecision::ShortCircuit(ShortCircuit::Payload(cached)));
            }
            debug!(key = %key, tier = ?access.tier(), "gate: paid miss, handler will write back");
            return Ok(GateDecision::Proceed(CacheTag(Some(key))));
        }

        let decision = match route.free_policy() {
            FreePolicy::Restricted => {
                debug!(route = route.route_key(), "gate: restricted for unpaid caller");
                ShortCircuit::Forbidden
            }
            FreePolicy::Static => {
                debug!(route = route.route_key(), "gate: serving static fallback");
                match fallbacks::for_route(route) {
                    Some(payload) => ShortCircuit::Payload(payload),
                    None => ShortCircuit::Forbidden,
                }
            }
            FreePolicy::FreeQuery => ShortCircuit::Payload(self.free_tier(route).await?),
        };
        Ok(GateDecision::ShortCircuit(decision))
    }

    /// Stores a handler's result under the key the gate handed out.
    pub async fn write_back<T: Serialize + ?Sized>(&self, tag: CacheTag, payload: &T) {
        if let Some(key) = tag.key() {
            self.cache.set(key, payload).await;
        }
    }

    /// Cached free-tier response, computed and cached on a miss. Query
    /// failures propagate and leave the cache untouched.
    async fn free_tier(&self, route: &GatedRoute) -> Result<Value, AppError> {
        let key = route.free_key();
        if let Some(cached) = self.cache.get(&key).await {
            debug!(key = %key, "gate: serving cached free response");
            return Ok(cached);
        }

        let payload = match *route {
            GatedRoute::Class10Careers => serde_json::to_value(
                self.catalog
                    .careers(CareerFilter::level(Level::Class10, Visibility::FreeTier))
                    .await?,
            )?,
            GatedRoute::StreamCareers { stream } => serde_json::to_value(
                self.catalog
                    .stream_careers(CareerFilter::stream(stream, Visibility::FreeTier))
                    .await?,
            )?,
            GatedRoute::StreamCareerDetail { career_id } => serde_json::to_value(
                self.catalog
                    .career_detail(career_id, Visibility::FreeTier)
                    .await?,
            )?,
            other => {
                return Err(AppError::Internal(anyhow!(
                    "route {} has no free-tier query",
                    other.route_key()
                )))
            }
        };

        debug!(key = %key, "gate: free miss, caching free-tier result");
        self.cache.set(&key, &payload).await;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use uuid::Uuid;

    use crate::auth::tokens::Identity;
    use crate::cache::{MemoryCache, DEFAULT_TTL};
    use crate::catalog::testing::{career, coaching, insight, pg, FakeCatalog};
    use crate::models::catalog::Stream;

    fn caller(is_paid: bool, is_admin: bool) -> Access {
        Access::verified(Identity {
            id: Uuid::new_v4(),
            email: "student@example.com".into(),
            is_paid,
            is_admin,
        })
    }

    fn memory_cache() -> ResponseCache {
        ResponseCache::new(Arc::new(MemoryCache::new()), DEFAULT_TTL)
    }

    fn gate_over(catalog: &Arc<FakeCatalog>, cache: &ResponseCache) -> ResponseGate {
        ResponseGate::new(cache.clone(), catalog.clone())
    }

    fn seeded() -> FakeCatalog {
        FakeCatalog {
            careers: vec![
                career("Electrician", Level::Class10, None, false),
                career("Pilot", Level::Class10, None, true),
                career("Engineer", Level::Stream, Some(Stream::Science), false),
                career("Surgeon", Level::Stream, Some(Stream::Science), true),
                career("Accountant", Level::Stream, Some(Stream::Commerce), false),
            ],
            ..FakeCatalog::default()
        }
    }

    /// Drives a paid request through the gate the way a handler does.
    async fn serve_paid_class10(gate: &ResponseGate, catalog: &FakeCatalog, access: &Access) -> Value {
        match gate.check(&GatedRoute::Class10Careers, access).await.unwrap() {
            GateDecision::ShortCircuit(ShortCircuit::Payload(v)) => v,
            GateDecision::ShortCircuit(ShortCircuit::Forbidden) => panic!("paid caller forbidden"),
            GateDecision::Proceed(tag) => {
                let careers = catalog
                    .careers_with_insights(CareerFilter::level(Level::Class10, Visibility::All))
                    .await
                    .unwrap();
                gate.write_back(tag, &careers).await;
                serde_json::to_value(careers).unwrap()
            }
        }
    }

    #[tokio::test]
    async fn test_paid_repeat_request_is_served_from_cache() {
        let catalog = Arc::new(seeded());
        let cache = memory_cache();
        let gate = gate_over(&catalog, &cache);
        let paid = caller(true, false);

        let first = serve_paid_class10(&gate, &catalog, &paid).await;
        let second = serve_paid_class10(&gate, &catalog, &paid).await;

        assert_eq!(first, second);
        assert_eq!(first.as_array().unwrap().len(), 2);
        assert_eq!(catalog.calls(), 1);
        assert!(cache.get("paid:class10-paid").await.is_some());
    }

    #[tokio::test]
    async fn test_admin_shares_the_paid_entry() {
        let catalog = Arc::new(seeded());
        let cache = memory_cache();
        let gate = gate_over(&catalog, &cache);

        serve_paid_class10(&gate, &catalog, &caller(true, false)).await;
        serve_paid_class10(&gate, &catalog, &caller(false, true)).await;

        assert_eq!(catalog.calls(), 1);
    }

    #[tokio::test]
    async fn test_paid_miss_hands_out_tag() {
        let catalog = Arc::new(seeded());
        let gate = gate_over(&catalog, &memory_cache());

        let decision = gate
            .check(&GatedRoute::Colleges, &caller(true, false))
            .await
            .unwrap();

        assert_eq!(
            decision,
            GateDecision::Proceed(CacheTag(Some("paid:colleges-paid".into())))
        );
        assert_eq!(catalog.calls(), 0);
    }

    #[tokio::test]
    async fn test_restricted_route_is_forbidden_below_paid() {
        let catalog = Arc::new(seeded());
        let gate = gate_over(&catalog, &memory_cache());
        let route = GatedRoute::CoachingPgs { id: Uuid::new_v4() };

        for access in [Access::anonymous(), caller(false, false)] {
            for _ in 0..2 {
                let decision = gate.check(&route, &access).await.unwrap();
                assert_eq!(decision, GateDecision::ShortCircuit(ShortCircuit::Forbidden));
            }
        }
        assert_eq!(catalog.calls(), 0);

        let response = ShortCircuit::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_anonymous_streams_get_static_list_without_data_access() {
        let catalog = Arc::new(seeded());
        let gate = gate_over(&catalog, &memory_cache());

        let decision = gate
            .check(&GatedRoute::Streams, &Access::anonymous())
            .await
            .unwrap();

        assert_eq!(
            decision,
            GateDecision::ShortCircuit(ShortCircuit::Payload(fallbacks::streams()))
        );
        assert_eq!(catalog.calls(), 0);
    }

    #[tokio::test]
    async fn test_free_class10_returns_free_records_and_caches_them() {
        let catalog = Arc::new(seeded());
        let cache = memory_cache();
        let gate = gate_over(&catalog, &cache);
        let free = caller(false, false);

        for _ in 0..3 {
            let GateDecision::ShortCircuit(ShortCircuit::Payload(payload)) =
                gate.check(&GatedRoute::Class10Careers, &free).await.unwrap()
            else {
                panic!("free class10 must short-circuit");
            };
            let names: Vec<&str> = payload
                .as_array()
                .unwrap()
                .iter()
                .map(|c| c["name"].as_str().unwrap())
                .collect();
            assert_eq!(names, ["Electrician"]);
        }

        assert_eq!(catalog.calls(), 1);
        assert!(cache.get("free:class10-free").await.is_some());
        assert!(cache.get("paid:class10-paid").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_all_forces_recompute() {
        let catalog = Arc::new(seeded());
        let cache = memory_cache();
        let gate = gate_over(&catalog, &cache);
        let paid = caller(true, false);
        let free = caller(false, false);

        serve_paid_class10(&gate, &catalog, &paid).await;
        gate.check(&GatedRoute::Class10Careers, &free).await.unwrap();
        assert_eq!(catalog.calls(), 2);

        cache.invalidate_all().await;

        serve_paid_class10(&gate, &catalog, &paid).await;
        gate.check(&GatedRoute::Class10Careers, &free).await.unwrap();
        assert_eq!(catalog.calls(), 4);
    }

    #[tokio::test]
    async fn test_parameterized_routes_never_share_entries() {
        let catalog = Arc::new(seeded());
        let gate = gate_over(&catalog, &memory_cache());
        let free = caller(false, false);

        let science = gate
            .check(&GatedRoute::StreamCareers { stream: Stream::Science }, &free)
            .await
            .unwrap();
        let commerce = gate
            .check(&GatedRoute::StreamCareers { stream: Stream::Commerce }, &free)
            .await
            .unwrap();

        assert_ne!(science, commerce);
        assert_eq!(catalog.calls(), 2);

        let paid = caller(true, false);
        let science_tag = gate
            .check(&GatedRoute::StreamCareers { stream: Stream::Science }, &paid)
            .await
            .unwrap();
        gate.write_back(
            match science_tag {
                GateDecision::Proceed(tag) => tag,
                other => panic!("unexpected {other:?}"),
            },
            &json!(["science only"]),
        )
        .await;

        let commerce = gate
            .check(&GatedRoute::StreamCareers { stream: Stream::Commerce }, &paid)
            .await
            .unwrap();
        assert!(matches!(commerce, GateDecision::Proceed(_)));
    }

    #[tokio::test]
    async fn test_free_stream_careers_include_insights_and_coaching() {
        let mut catalog = seeded();
        let engineer = catalog.careers[2].id;
        let center = coaching("Apex Coaching", "Kota");
        catalog.links.push((engineer, center.id));
        catalog.coaching.push(center);
        catalog.insights.push(insight(engineer, 0, 600_000.0));
        let catalog = Arc::new(catalog);
        let gate = gate_over(&catalog, &memory_cache());

        let decision = gate
            .check(
                &GatedRoute::StreamCareers { stream: Stream::Science },
                &Access::anonymous(),
            )
            .await
            .unwrap();

        let GateDecision::ShortCircuit(ShortCircuit::Payload(payload)) = decision else {
            panic!("free stream careers must short-circuit");
        };
        let careers = payload.as_array().unwrap();
        assert_eq!(careers.len(), 1);
        assert_eq!(careers[0]["name"], "Engineer");
        assert_eq!(careers[0]["salaryInsights"][0]["year"], 0);
        assert_eq!(careers[0]["coaching"][0]["name"], "Apex Coaching");
    }

    #[tokio::test]
    async fn test_free_career_detail_hides_paid_career_and_paid_pgs() {
        let mut catalog = seeded();
        let engineer = catalog.careers[2].id;
        let surgeon = catalog.careers[3].id;
        let center = coaching("Apex Coaching", "Kota");
        catalog.links.push((engineer, center.id));
        catalog.pgs.push(pg("Budget PG", center.id, "Kota", 0.5, false));
        catalog.pgs.push(pg("Premium PG", center.id, "Kota", 0.2, true));
        catalog.coaching.push(center);
        let catalog = Arc::new(catalog);
        let cache = memory_cache();
        let gate = gate_over(&catalog, &cache);
        let anon = Access::anonymous();

        let detail = gate
            .check(&GatedRoute::StreamCareerDetail { career_id: engineer }, &anon)
            .await
            .unwrap();
        let GateDecision::ShortCircuit(ShortCircuit::Payload(detail)) = detail else {
            panic!("free detail must short-circuit");
        };
        let pgs = detail["coaching"][0]["pgs"].as_array().unwrap();
        assert_eq!(pgs.len(), 1);
        assert_eq!(pgs[0]["name"], "Budget PG");

        let hidden = gate
            .check(&GatedRoute::StreamCareerDetail { career_id: surgeon }, &anon)
            .await
            .unwrap();
        assert_eq!(
            hidden,
            GateDecision::ShortCircuit(ShortCircuit::Payload(Value::Null))
        );

        // A cached null is still a hit.
        let calls = catalog.calls();
        gate.check(&GatedRoute::StreamCareerDetail { career_id: surgeon }, &anon)
            .await
            .unwrap();
        assert_eq!(catalog.calls(), calls);
    }

    #[tokio::test]
    async fn test_failed_free_query_caches_nothing() {
        let catalog = Arc::new(FakeCatalog {
            failing: true,
            ..seeded()
        });
        let cache = memory_cache();
        let gate = gate_over(&catalog, &cache);

        let result = gate
            .check(&GatedRoute::Class10Careers, &Access::anonymous())
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert!(cache.get("free:class10-free").await.is_none());
    }

    #[tokio::test]
    async fn test_repeated_write_back_is_idempotent() {
        let catalog = Arc::new(seeded());
        let cache = memory_cache();
        let gate = gate_over(&catalog, &cache);
        let payload = json!([{ "id": "x", "name": "Doctor" }]);

        for _ in 0..3 {
            let tag = CacheTag(Some(GatedRoute::Colleges.paid_key()));
            gate.write_back(tag, &payload).await;
        }

        assert_eq!(cache.get("paid:colleges-paid").await, Some(payload.clone()));
        let decision = gate
            .check(&GatedRoute::Colleges, &caller(true, false))
            .await
            .unwrap();
        assert_eq!(decision, GateDecision::ShortCircuit(ShortCircuit::Payload(payload)));
    }

    #[tokio::test]
    async fn test_disabled_cache_always_proceeds_with_empty_tag() {
        let catalog = Arc::new(seeded());
        let gate = gate_over(&catalog, &ResponseCache::disabled());
        let paid = caller(true, false);

        for _ in 0..2 {
            let decision = gate.check(&GatedRoute::Class10Careers, &paid).await.unwrap();
            assert_eq!(decision, GateDecision::Proceed(CacheTag::empty()));
        }

        gate.check(&GatedRoute::Class10Careers, &Access::anonymous())
            .await
            .unwrap();
        gate.check(&GatedRoute::Class10Careers, &Access::anonymous())
            .await
            .unwrap();
        assert_eq!(catalog.calls(), 2);
    }
}
