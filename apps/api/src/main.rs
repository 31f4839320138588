mod admin;
mod advisor;
mod auth;
mod cache;
mod catalog;
mod config;
mod db;
mod errors;
mod gate;
mod llm_client;
mod models;
mod plans;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::{MemoryCache, RedisCache, ResponseCache};
use crate::config::{CacheBackend, Config};
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Guidance API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize the response cache
    let cache = build_cache(&config).await;

    // Initialize LLM client
    let llm = LlmClient::new(config.gemini_api_key.clone());
    if llm.is_configured() {
        info!("LLM client initialized (model: {})", llm_client::MODEL);
    } else {
        warn!("GEMINI_API_KEY is not set: AI endpoints will report AI_NOT_CONFIGURED");
    }

    let state = AppState::new(db, cache, llm, config.clone());

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Picks the cache backend. An unreachable Redis degrades to no cache
/// rather than keeping the service down.
async fn build_cache(config: &Config) -> ResponseCache {
    let ttl = Duration::from_secs(config.cache_ttl_secs);
    match config.cache_backend {
        CacheBackend::Memory => {
            let memory = MemoryCache::new();
            memory.spawn_sweeper();
            ResponseCache::new(Arc::new(memory), ttl)
        }
        CacheBackend::Redis => {
            let Some(url) = config.redis_url.as_deref() else {
                warn!("CACHE_BACKEND=redis without REDIS_URL");
                return ResponseCache::disabled();
            };
            match RedisCache::connect(url).await {
                Ok(redis) => ResponseCache::new(Arc::new(redis), ttl),
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, continuing without a response cache");
                    ResponseCache::disabled()
                }
            }
        }
        CacheBackend::Disabled => ResponseCache::disabled(),
    }
}
