//! Configuration management for ForgeHook
//!
//! Loads and validates configuration from environment variables. Every knob
//! has a production default; only DATABASE_URL is required.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Main configuration struct for the webhook subsystem
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub delivery: DeliveryConfig,
    pub autofix: AutofixConfig,
}

/// SQLite database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection string, e.g. sqlite://forgehook.db
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

/// REST API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to (0.0.0.0 for all interfaces)
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

/// Webhook delivery configuration
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Default per-delivery timeout when a webhook does not set its own
    pub default_timeout_ms: i64,

    /// Maximum attempts per job (first attempt included)
    pub max_retries: i32,

    /// Retry schedule in milliseconds; the last entry repeats
    pub retry_delays_ms: Vec<u64>,

    /// Response body capture cap in bytes
    pub response_body_cap_bytes: usize,

    /// Serialized payload size cap in bytes
    pub payload_size_cap_bytes: usize,

    /// Terminal jobs older than this are reclaimed
    pub job_retention_ms: i64,

    /// Log rows older than this are reclaimed
    pub log_retention_ms: i64,

    /// Interval between retention sweeps
    pub retention_sweep_interval: Duration,

    /// Permit deliveries to loopback/private hosts. Off in production;
    /// local development and the test suite turn it on.
    pub allow_private_targets: bool,
}

/// Auto-fix pipeline configuration
#[derive(Debug, Clone)]
pub struct AutofixConfig {
    /// Concurrent fix attempts per session
    pub max_concurrent_fixes: usize,

    /// Attempts per classified error
    pub max_retries: u32,

    /// Window during which a repeated error hash is suppressed
    pub dedup_window_ms: u64,

    /// Use exponential backoff between fix attempts
    pub exponential_backoff: bool,

    /// Base delay between fix attempts
    pub base_delay_ms: u64,

    /// Backoff cap
    pub max_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables (and .env if present).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            database: Self::load_database()?,
            api: Self::load_api()?,
            delivery: Self::load_delivery()?,
            autofix: Self::load_autofix()?,
        })
    }

    fn load_database() -> Result<DatabaseConfig> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
        })
    }

    fn load_api() -> Result<ApiConfig> {
        Ok(ApiConfig {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("API_PORT", 8080)?,
        })
    }

    fn load_delivery() -> Result<DeliveryConfig> {
        Ok(DeliveryConfig {
            default_timeout_ms: parse_or("WEBHOOK_DEFAULT_TIMEOUT_MS", 30_000)?,
            max_retries: parse_or("WEBHOOK_MAX_RETRIES", 3)?,
            retry_delays_ms: parse_delay_list(
                &env::var("WEBHOOK_RETRY_DELAYS_MS").unwrap_or_else(|_| "1000,5000,30000".into()),
            )?,
            response_body_cap_bytes: parse_or("WEBHOOK_RESPONSE_BODY_CAP_BYTES", 65_536)?,
            payload_size_cap_bytes: parse_or("WEBHOOK_PAYLOAD_SIZE_CAP_BYTES", 1_048_576)?,
            job_retention_ms: parse_or("WEBHOOK_JOB_RETENTION_MS", 7 * 24 * 3600 * 1000)?,
            log_retention_ms: parse_or("WEBHOOK_LOG_RETENTION_MS", 30 * 24 * 3600 * 1000)?,
            retention_sweep_interval: Duration::from_millis(parse_or(
                "WEBHOOK_RETENTION_SWEEP_INTERVAL_MS",
                3_600_000u64,
            )?),
            allow_private_targets: env::var("WEBHOOK_ALLOW_PRIVATE_TARGETS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    fn load_autofix() -> Result<AutofixConfig> {
        Ok(AutofixConfig {
            max_concurrent_fixes: parse_or("FIX_MAX_CONCURRENT", 2)?,
            max_retries: parse_or("FIX_MAX_RETRIES", 3)?,
            dedup_window_ms: parse_or("WEBHOOK_DEDUP_WINDOW_MS", 60_000u64)?,
            exponential_backoff: env::var("FIX_EXPONENTIAL_BACKOFF")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            base_delay_ms: parse_or("FIX_BASE_DELAY_MS", 1_000u64)?,
            max_delay_ms: parse_or("FIX_MAX_DELAY_MS", 30_000u64)?,
        })
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            max_retries: 3,
            retry_delays_ms: vec![1_000, 5_000, 30_000],
            response_body_cap_bytes: 65_536,
            payload_size_cap_bytes: 1_048_576,
            job_retention_ms: 7 * 24 * 3600 * 1000,
            log_retention_ms: 30 * 24 * 3600 * 1000,
            retention_sweep_interval: Duration::from_secs(3600),
            allow_private_targets: false,
        }
    }
}

impl Default for AutofixConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fixes: 2,
            max_retries: 3,
            dedup_window_ms: 60_000,
            exponential_backoff: true,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

/// Parse an env var, falling back to a default when unset.
fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid value, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

/// Parse a comma-separated delay list, e.g. "1000,5000,30000".
fn parse_delay_list(raw: &str) -> Result<Vec<u64>> {
    let delays = raw
        .split(',')
        .map(|s| s.trim().parse::<u64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("WEBHOOK_RETRY_DELAYS_MS must be comma-separated ms, got {raw:?}"))?;

    if delays.is_empty() {
        anyhow::bail!("WEBHOOK_RETRY_DELAYS_MS must contain at least one delay");
    }
    Ok(delays)
}
