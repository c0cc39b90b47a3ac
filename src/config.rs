// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup by each binary and passed down explicitly.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default Intra API root.
pub const DEFAULT_INTRA_API_URL: &str = "https://api.intra.42.fr";

/// Which profile store implementation backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid("STORE_BACKEND")),
        }
    }
}

/// Retry policy for calls that hit the Intra rate limit.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; the call is made at most `max_retries + 1` times.
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound of the random jitter added to each delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }
}

/// Pacing for the offline bulk population job.
#[derive(Debug, Clone)]
pub struct PopulateConfig {
    pub page_size: u32,
    pub batch_size: usize,
    pub page_delay: Duration,
    pub batch_delay: Duration,
    /// Stop after this many pages (all pages when `None`).
    pub max_pages: Option<u32>,
}

impl Default for PopulateConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            batch_size: 100,
            page_delay: Duration::from_millis(500),
            batch_delay: Duration::from_millis(200),
            max_pages: None,
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Intra API ---
    /// OAuth application UID
    pub intra_client_id: String,
    /// OAuth application secret
    pub intra_client_secret: String,
    /// API root, also hosts the token endpoint
    pub intra_api_url: String,
    /// Timeout applied to every outbound request
    pub request_timeout: Duration,
    pub retry: RetryPolicy,

    // --- Cache ---
    pub store_backend: StoreBackend,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Cached profiles older than this are refetched (never when `None`)
    pub profile_max_age: Option<Duration>,
    /// Bound on concurrent background cache writes
    pub max_concurrent_cache_writes: usize,

    // --- HTTP ---
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,

    pub populate: PopulateConfig,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let retry_defaults = RetryPolicy::default();
        let populate_defaults = PopulateConfig::default();

        Ok(Self {
            intra_client_id: required("INTRA_CLIENT_ID")?,
            intra_client_secret: required("INTRA_CLIENT_SECRET")?,
            intra_api_url: env::var("INTRA_API_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_INTRA_API_URL.to_string()),
            request_timeout: Duration::from_secs(parsed("REQUEST_TIMEOUT_SECS", 10)?),
            retry: RetryPolicy {
                max_retries: parsed("RATE_LIMIT_MAX_RETRIES", retry_defaults.max_retries)?,
                base_backoff: Duration::from_millis(parsed(
                    "RATE_LIMIT_BASE_BACKOFF_MS",
                    retry_defaults.base_backoff.as_millis() as u64,
                )?),
                max_backoff: Duration::from_millis(parsed(
                    "RATE_LIMIT_MAX_BACKOFF_MS",
                    retry_defaults.max_backoff.as_millis() as u64,
                )?),
                jitter: retry_defaults.jitter,
            },
            store_backend: env::var("STORE_BACKEND")
                .map(|v| v.parse::<StoreBackend>())
                .unwrap_or(Ok(StoreBackend::Firestore))?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            profile_max_age: optional::<u64>("PROFILE_MAX_AGE_SECS")?.map(Duration::from_secs),
            max_concurrent_cache_writes: parsed("MAX_CONCURRENT_CACHE_WRITES", 16)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            populate: PopulateConfig {
                page_delay: Duration::from_millis(parsed(
                    "POPULATE_PAGE_DELAY_MS",
                    populate_defaults.page_delay.as_millis() as u64,
                )?),
                batch_delay: Duration::from_millis(parsed(
                    "POPULATE_BATCH_DELAY_MS",
                    populate_defaults.batch_delay.as_millis() as u64,
                )?),
                max_pages: optional("POPULATE_MAX_PAGES")?,
                ..populate_defaults
            },
        })
    }

    /// Config for tests: memory store, fast retries, no delays.
    pub fn test_default() -> Self {
        Self {
            intra_client_id: "test_client_id".to_string(),
            intra_client_secret: "test_secret".to_string(),
            intra_api_url: "http://127.0.0.1:9".to_string(),
            request_timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_retries: 3,
                base_backoff: Duration::from_millis(5),
                max_backoff: Duration::from_millis(20),
                jitter: Duration::ZERO,
            },
            store_backend: StoreBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            profile_max_age: None,
            max_concurrent_cache_writes: 4,
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            populate: PopulateConfig {
                page_delay: Duration::ZERO,
                batch_delay: Duration::ZERO,
                ..PopulateConfig::default()
            },
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn optional<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        _ => Ok(None),
    }
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(optional(name)?.unwrap_or(default))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
