//! # ForgeHook Common Library
//!
//! Shared utilities and infrastructure code used by all ForgeHook services.
//!
//! This crate provides:
//! - Database connection pooling (SQLite via sqlx)
//! - Custom error types
//! - HMAC signature helpers for the outbound wire protocol
//! - Outbound URL vetting (SSRF guard)
//! - Retry/backoff policy shared by the delivery queue and the auto-fix pipeline
//! - Structured logging setup

// Module declarations
pub mod backoff;
pub mod db;
pub mod error;
pub mod logging;
pub mod signature;
pub mod url_guard;

// Re-export commonly used types
pub use backoff::{fixed_delay, exponential_delay, is_retryable_status};
pub use db::create_pool;
pub use error::{Error, Result};
pub use logging::init_tracing;
pub use signature::{generate_secret, sign_payload, verify_signature, SIGNATURE_TOLERANCE_MS};
pub use url_guard::{validate_target_url, validate_target_url_with};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Timestamps on the wire (payload `timestamp`, `X-Webhook-Timestamp`,
/// job `scheduled_at`) are all decimal milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
