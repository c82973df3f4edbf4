//! Counter configuration from environment variables
//!
//! Static settings (chunk size, quota, TTLs, credentials) come from the
//! environment. Mutable runtime state (cursors, quota window, totals) is kept
//! in the `settings` table instead, see `store::settings`.

use crate::error::{CounterError, CounterResult};
use std::env;

/// Default Google Analytics Core Reporting endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/analytics/v3/data/ga";

/// The remote API refuses pages larger than this
pub const MAX_CHUNK_SIZE: u64 = 10_000;

/// Configuration for the counter runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CounterConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Rows requested per remote page, and items per mirror chunk
    pub chunk_size: u64,

    /// Maximum non-cached remote calls per rolling 24h window
    pub daily_quota: u64,

    /// TTL for cached remote pages and cached path sums
    pub cache_ttl_secs: i64,

    /// How far back the report reaches. 0 means all time.
    pub lookback_secs: i64,

    /// Minimum time between sync cycles
    pub sync_interval_secs: u64,

    /// Remote request timeout
    pub request_timeout_secs: u64,

    /// Canonical path of the site front page (e.g. "node")
    pub front_page: String,

    /// Language codes enabled on the site
    pub languages: Vec<String>,

    /// Analytics profile (view) id
    pub profile_id: String,

    /// Bearer token obtained by the (external) OAuth flow
    pub access_token: String,

    pub api_base_url: String,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            db_path: "gacounter.db".to_string(),
            chunk_size: 1_000,
            daily_quota: 10_000,
            cache_ttl_secs: 86_400,
            lookback_secs: 0,
            sync_interval_secs: 1_800,
            request_timeout_secs: 30,
            front_page: "node".to_string(),
            languages: vec!["en".to_string()],
            profile_id: String::new(),
            access_token: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl CounterConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `GACOUNTER_DB_PATH` (default: gacounter.db)
    /// - `GACOUNTER_CHUNK_SIZE` (default: 1000, clamped to 1..=10000)
    /// - `GACOUNTER_DAILY_QUOTA` (default: 10000)
    /// - `GACOUNTER_CACHE_TTL_SECS` (default: 86400)
    /// - `GACOUNTER_LOOKBACK_SECS` (default: 0 = all time)
    /// - `GACOUNTER_SYNC_INTERVAL_SECS` (default: 1800)
    /// - `GACOUNTER_REQUEST_TIMEOUT_SECS` (default: 30)
    /// - `GACOUNTER_FRONT_PAGE` (default: node)
    /// - `GACOUNTER_LANGUAGES` (default: en)
    /// - `GACOUNTER_PROFILE_ID`, `GACOUNTER_ACCESS_TOKEN` (default: empty)
    /// - `GACOUNTER_API_BASE_URL`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            db_path: env::var("GACOUNTER_DB_PATH").unwrap_or(defaults.db_path),

            chunk_size: parse_var("GACOUNTER_CHUNK_SIZE")
                .unwrap_or(defaults.chunk_size)
                .clamp(1, MAX_CHUNK_SIZE),

            daily_quota: parse_var("GACOUNTER_DAILY_QUOTA").unwrap_or(defaults.daily_quota),

            cache_ttl_secs: parse_var("GACOUNTER_CACHE_TTL_SECS")
                .unwrap_or(defaults.cache_ttl_secs),

            lookback_secs: parse_var("GACOUNTER_LOOKBACK_SECS")
                .unwrap_or(defaults.lookback_secs),

            sync_interval_secs: parse_var("GACOUNTER_SYNC_INTERVAL_SECS")
                .unwrap_or(defaults.sync_interval_secs),

            request_timeout_secs: parse_var("GACOUNTER_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),

            front_page: env::var("GACOUNTER_FRONT_PAGE")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or(defaults.front_page),

            languages: env::var("GACOUNTER_LANGUAGES")
                .map(|s| {
                    s.split(',')
                        .map(|l| l.trim().to_string())
                        .filter(|l| !l.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.languages),

            profile_id: env::var("GACOUNTER_PROFILE_ID").unwrap_or_default(),
            access_token: env::var("GACOUNTER_ACCESS_TOKEN").unwrap_or_default(),

            api_base_url: env::var("GACOUNTER_API_BASE_URL").unwrap_or(defaults.api_base_url),
        }
    }

    /// Check that the settings needed for remote fetching are present
    pub fn validate_remote(&self) -> CounterResult<()> {
        if self.profile_id.is_empty() {
            return Err(CounterError::Config(
                "GACOUNTER_PROFILE_ID is not set".to_string(),
            ));
        }
        if self.access_token.is_empty() {
            return Err(CounterError::Config(
                "GACOUNTER_ACCESS_TOKEN is not set".to_string(),
            ));
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(CounterError::Config(
                "GACOUNTER_API_BASE_URL must start with http:// or https://".to_string(),
            ));
        }
        Ok(())
    }
}

/// Log filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Logger for the binaries: `RUST_LOG` when set, `info` otherwise, on stderr
pub fn log_builder() -> env_logger::Builder {
    log_builder_from(env_logger::Env::default())
}

fn log_builder_from(env: env_logger::Env) -> env_logger::Builder {
    let mut builder = env_logger::Builder::from_env(env.default_filter_or(DEFAULT_LOG_FILTER));
    builder.target(env_logger::Target::Stderr);
    builder
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
