//! Retry policy shared by the delivery queue and the auto-fix pipeline
//!
//! The delivery queue uses the fixed schedule (1s, 5s, 30s by default); the
//! auto-fix pipeline may opt into exponential mode for longer chains.

use rand::Rng;
use std::time::Duration;

/// Default fixed retry schedule in milliseconds.
pub const DEFAULT_RETRY_DELAYS_MS: [u64; 3] = [1_000, 5_000, 30_000];

/// Delay before the attempt that follows `failed_attempt`.
///
/// `failed_attempt` is the 1-based attempt number that just failed; the
/// schedule is indexed so that the first failure waits `delays[0]`, the
/// second `delays[1]`, and anything past the table gets the last entry.
pub fn fixed_delay(failed_attempt: u32, delays_ms: &[u64]) -> Duration {
    debug_assert!(failed_attempt >= 1);
    let idx = (failed_attempt.saturating_sub(1) as usize).min(delays_ms.len().saturating_sub(1));
    Duration::from_millis(*delays_ms.get(idx).unwrap_or(&30_000))
}

/// Exponential backoff with jitter: `min(base * 2^(n-1), max) ± 20%`.
///
/// # Arguments
///
/// * `failed_attempt` - 1-based attempt number that just failed
/// * `base_ms` - base delay in milliseconds
/// * `max_ms` - cap in milliseconds
pub fn exponential_delay(failed_attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    debug_assert!(failed_attempt >= 1);
    let exp = base_ms.saturating_mul(2u64.saturating_pow(failed_attempt.saturating_sub(1)));
    let capped = exp.min(max_ms);

    // ±20% jitter to prevent thundering herd
    let mut rng = rand::thread_rng();
    let jitter_factor = rng.gen_range(0.8..1.2);
    Duration::from_millis((capped as f64 * jitter_factor) as u64)
}

/// Check whether an HTTP status code is a retryable delivery failure.
///
/// * 2xx - success, never retried
/// * 4xx - client error, permanent
/// * 5xx - server error, retryable
pub fn is_retryable_status(status: Option<u16>) -> bool {
    match status {
        // No status: the transport layer decides (see is_transient_transport_error)
        None => false,
        Some(s) if (200..300).contains(&s) => false,
        Some(s) if (400..500).contains(&s) => false,
        Some(s) if s >= 500 => true,
        // 1xx/3xx responses to a POST are not part of the contract
        Some(_) => false,
    }
}

/// Check whether a transport-level error string belongs to a transient
/// family: deadline exhaustion, connection refused/reset, DNS resolution
/// failure, or a TLS handshake failure. Unknown errors are permanent.
pub fn is_transient_transport_error(error: &str) -> bool {
    let lower = error.to_ascii_lowercase();
    lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("dns error")
        || lower.contains("failed to lookup")
        || lower.contains("tls handshake")
        || lower.contains("handshake failure")
}
