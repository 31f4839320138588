use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Which response cache backend the process runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Redis,
    Disabled,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "" => Ok(CacheBackend::Memory),
            "redis" => Ok(CacheBackend::Redis),
            "disabled" | "none" | "off" => Ok(CacheBackend::Disabled),
            other => bail!("CACHE_BACKEND must be one of memory, redis, disabled (got '{other}')"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub cache_backend: CacheBackend,
    pub redis_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub gemini_api_key: Option<String>,
    pub allow_admin_signup: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let cache_backend: CacheBackend = optional_env("CACHE_BACKEND")
            .unwrap_or_else(|| "memory".to_string())
            .parse()?;
        let redis_url = optional_env("REDIS_URL");
        if cache_backend == CacheBackend::Redis && redis_url.is_none() {
            bail!("REDIS_URL is required when CACHE_BACKEND=redis");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            cache_backend,
            redis_url,
            cache_ttl_secs: parse_env("CACHE_TTL_SECS", 300)?,
            jwt_secret: require_env("JWT_SECRET")?,
            token_ttl_hours: parse_env("TOKEN_TTL_HOURS", 24 * 7)?,
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            allow_admin_signup: parse_env("ALLOW_ADMIN_SIGNUP", false)?,
            port: parse_env("PORT", 3001)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

#[cfg(test)]
impl Config {
    /// Defaults for router-level tests. Nothing here is ever connected to.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/guidance_test".to_string(),
            cache_backend: CacheBackend::Memory,
            redis_url: None,
            cache_ttl_secs: 300,
            jwt_secret: "test-secret".to_string(),
            token_ttl_hours: 1,
            gemini_api_key: None,
            allow_admin_signup: false,
            port: 0,
            rust_log: "info".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank values both read as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
