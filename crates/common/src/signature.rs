//! Outbound wire-protocol signatures
//!
//! Every delivery is signed with HMAC-SHA256 over the canonical string
//! `"{timestamp_ms}.{payload}"`. The timestamp doubles as replay protection:
//! receivers reject signatures whose timestamp is more than five minutes away
//! from their own clock.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Scheme prefix carried in the `X-Webhook-Signature` header.
pub const SIGNATURE_SCHEME: &str = "sha256=";

/// Replay window: signatures older (or newer) than this are rejected.
pub const SIGNATURE_TOLERANCE_MS: i64 = 5 * 60 * 1000;

/// Number of random bytes in a freshly generated webhook secret.
const SECRET_BYTES: usize = 32;

/// Sign a payload for delivery.
///
/// The canonical string is the decimal millisecond timestamp, a literal `.`,
/// then the exact payload bytes that will be sent as the request body.
///
/// # Returns
///
/// `"sha256=" + lowercase hex digest` — always 71 characters.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp_ms: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");

    mac.update(timestamp_ms.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let digest = mac.finalize().into_bytes();
    format!("{}{}", SIGNATURE_SCHEME, hex::encode(digest))
}

/// Verify a signature header against a payload.
///
/// Recomputes the signature with the stored secret and compares in constant
/// time. Rejects when the header does not carry the `sha256=` scheme or when
/// `|now_ms - timestamp_ms|` exceeds the replay window.
pub fn verify_signature(
    header: &str,
    payload: &[u8],
    secret: &str,
    timestamp_ms: i64,
    now_ms: i64,
) -> bool {
    if !header.starts_with(SIGNATURE_SCHEME) {
        return false;
    }

    if (now_ms - timestamp_ms).abs() > SIGNATURE_TOLERANCE_MS {
        return false;
    }

    let expected = sign_payload(payload, secret, timestamp_ms);
    constant_time_eq(expected.as_bytes(), header.as_bytes())
}

/// Generate a fresh webhook secret: 32 cryptographically random bytes,
/// hex-encoded (64 characters).
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Constant-time byte comparison.
///
/// Must not short-circuit on the first mismatch; the accumulator folds every
/// byte pair before the final check.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
