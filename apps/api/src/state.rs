use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::TokenKeys;
use crate::cache::ResponseCache;
use crate::catalog::{CatalogStore, PgCatalog};
use crate::config::Config;
use crate::gate::ResponseGate;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Read side of the catalog. The gate queries the same store.
    pub catalog: Arc<dyn CatalogStore>,
    pub cache: ResponseCache,
    pub gate: ResponseGate,
    pub tokens: TokenKeys,
    pub llm: LlmClient,
    pub config: Config,
}

impl AppState {
    pub fn new(db: PgPool, cache: ResponseCache, llm: LlmClient, config: Config) -> Self {
        let catalog: Arc<dyn CatalogStore> = Arc::new(PgCatalog::new(db.clone()));
        Self::with_catalog(db, catalog, cache, llm, config)
    }

    pub fn with_catalog(
        db: PgPool,
        catalog: Arc<dyn CatalogStore>,
        cache: ResponseCache,
        llm: LlmClient,
        config: Config,
    ) -> Self {
        Self {
            gate: ResponseGate::new(cache.clone(), catalog.clone()),
            tokens: TokenKeys::new(&config.jwt_secret, config.token_ttl_hours),
            db,
            catalog,
            cache,
            llm,
            config,
        }
    }
}
