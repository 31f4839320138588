//! Response cache: the key/value store the paywall gate reads and writes.
//!
//! `CacheStore` is the backend seam (in-process map or Redis). Callers never
//! touch a backend directly: they go through `ResponseCache`, which owns the
//! default TTL, counts hits and misses, and turns backend failures into
//! misses / skipped writes so a broken cache only costs latency.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod memory;
pub mod redis;

pub use memory::MemoryCache;
pub use self::redis::RedisCache;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Payload (de)serialization error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A key/value store with per-key expiry.
///
/// `get` returns `Ok(None)` for absent and expired keys. A stored JSON `null`
/// comes back as `Ok(Some(Value::Null))`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name for logs and stats.
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether a live key was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every key regardless of remaining TTL.
    async fn flush_all(&self) -> Result<(), CacheError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub backend: &'static str,
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Process-wide response cache handle. Cheap to clone.
#[derive(Clone)]
pub struct ResponseCache {
    store: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
    counters: Arc<Counters>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        info!(
            "Response cache enabled (backend: {}, ttl: {}s)",
            store.backend(),
            ttl.as_secs()
        );
        Self {
            store: Some(store),
            ttl,
            counters: Arc::default(),
        }
    }

    /// A cache with no backend. Every lookup misses and every write is skipped.
    pub fn disabled() -> Self {
        warn!("Response cache is DISABLED: every gated request will hit the database");
        Self {
            store: None,
            ttl: DEFAULT_TTL,
            counters: Arc::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let store = self.store.as_ref()?;
        match store.get(key).await {
            Ok(Some(value)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache hit");
                Some(value)
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache miss");
                None
            }
            Err(e) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                warn!(key, "cache read failed, treating as miss: {e}");
                None
            }
        }
    }

    /// Stores any serializable payload under `key` with the default TTL.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, "cache payload not serializable, skipping write: {e}");
                return;
            }
        };
        if let Err(e) = store.set(key, &value, self.ttl).await {
            warn!(key, "cache write failed, skipping: {e}");
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };
        store.delete(key).await.unwrap_or_else(|e| {
            warn!(key, "cache delete failed: {e}");
            false
        })
    }

    /// Drops every cached response.
    pub async fn invalidate_all(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        match store.flush_all().await {
            Ok(()) => info!("Response cache flushed"),
            Err(e) => warn!("cache flush failed: {e}"),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            backend: self.store.as_ref().map(|s| s.backend()).unwrap_or("disabled"),
            enabled: self.is_enabled(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }
}
