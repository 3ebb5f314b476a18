/*!
 * Webhook Delivery Client
 *
 * Sends one HTTP POST to a receiver with the signed wire-protocol headers.
 * The body is the exact byte sequence that was signed.
 */

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use forgehook_common::backoff::{is_retryable_status, is_transient_transport_error};
use forgehook_common::{now_ms, sign_payload};

/// Fixed product identifier sent on every delivery.
pub const USER_AGENT: &str = concat!("ForgeHook-Webhooks/", env!("CARGO_PKG_VERSION"));

/// Headers that user-configured custom headers may not override.
const RESERVED_HEADERS: [&str; 5] = [
    "content-type",
    "x-webhook-signature",
    "x-webhook-timestamp",
    "x-event-type",
    "user-agent",
];

/// Webhook delivery result
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub should_retry: bool,
}

impl DeliveryResult {
    fn rejected(error: String) -> Self {
        Self {
            success: false,
            status_code: None,
            response_body: None,
            error_message: Some(error),
            duration_ms: 0,
            should_retry: false,
        }
    }
}

/// Webhook delivery client
///
/// One shared reqwest client; per-request deadlines come from each webhook's
/// configured timeout.
pub struct DeliveryClient {
    client: reqwest::Client,
    response_body_cap: usize,
    allow_private_targets: bool,
}

impl DeliveryClient {
    /// Create a new delivery client.
    ///
    /// # Arguments
    ///
    /// * `response_body_cap` - Max bytes of response body to capture
    /// * `allow_private_targets` - Skip the SSRF guard (tests/local dev only)
    pub fn new(response_body_cap: usize, allow_private_targets: bool) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?;

        Ok(Self {
            client,
            response_body_cap,
            allow_private_targets,
        })
    }

    /// Vet a target URL, honoring the private-target escape hatch.
    pub fn check_target(&self, url: &str) -> Result<(), String> {
        forgehook_common::validate_target_url_with(url, self.allow_private_targets)
    }

    /// Deliver a payload to a receiver.
    ///
    /// # Arguments
    ///
    /// * `url` - Receiver URL (re-validated here; a webhook edited into a
    ///   private address after creation still gets rejected)
    /// * `payload` - The frozen payload bytes; sent verbatim
    /// * `secret` - The webhook's current HMAC secret
    /// * `event_type` - Event kind, sent as X-Event-Type
    /// * `timeout_ms` - Hard deadline for the whole request
    /// * `custom_headers` - User-configured extras (reserved names skipped)
    pub async fn deliver(
        &self,
        url: &str,
        payload: &[u8],
        secret: &str,
        event_type: &str,
        timeout_ms: i64,
        custom_headers: &HashMap<String, String>,
    ) -> DeliveryResult {
        if let Err(reason) = self.check_target(url) {
            return DeliveryResult::rejected(format!("target rejected: {reason}"));
        }

        let timestamp_ms = now_ms();
        let signature = sign_payload(payload, secret, timestamp_ms);

        let headers = match build_headers(&signature, timestamp_ms, event_type, custom_headers) {
            Ok(h) => h,
            Err(reason) => return DeliveryResult::rejected(reason),
        };

        let start = Instant::now();

        debug!(
            "Sending webhook to {} (event: {})",
            &url[..60.min(url.len())],
            event_type
        );

        let response_result = self
            .client
            .post(url)
            .headers(headers)
            .timeout(Duration::from_millis(timeout_ms.max(1) as u64))
            .body(payload.to_vec())
            .send()
            .await;

        match response_result {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let success = (200..300).contains(&status_code);

                // Capture the response body up to the cap; discard the rest
                let response_body = response.bytes().await.ok().map(|b| {
                    let capped = &b[..b.len().min(self.response_body_cap)];
                    String::from_utf8_lossy(capped).into_owned()
                });

                let duration_ms = start.elapsed().as_millis() as u64;
                let should_retry = !success && is_retryable_status(Some(status_code));

                if !success {
                    warn!(
                        "Webhook delivery failed: status={} duration={}ms retry={}",
                        status_code, duration_ms, should_retry
                    );
                }

                DeliveryResult {
                    success,
                    status_code: Some(status_code),
                    response_body,
                    error_message: None,
                    duration_ms,
                    should_retry,
                }
            }
            Err(e) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                let error_message = e.to_string();

                // Timeouts and connect failures are transient; anything else
                // is matched against the transient string families and is
                // otherwise permanent.
                let should_retry = e.is_timeout()
                    || e.is_connect()
                    || is_transient_transport_error(&error_message);

                warn!(
                    "Webhook delivery error: error={} duration={}ms retry={}",
                    error_message, duration_ms, should_retry
                );

                DeliveryResult {
                    success: false,
                    status_code: None,
                    response_body: None,
                    error_message: Some(error_message),
                    duration_ms,
                    should_retry,
                }
            }
        }
    }
}

/// Build the wire-protocol header set. Custom headers never override the
/// reserved five.
fn build_headers(
    signature: &str,
    timestamp_ms: i64,
    event_type: &str,
    custom_headers: &HashMap<String, String>,
) -> Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();

    headers.insert("Content-Type", HeaderValue::from_static("application/json"));
    headers.insert(
        "X-Webhook-Signature",
        HeaderValue::from_str(signature).map_err(|e| format!("bad signature header: {e}"))?,
    );
    headers.insert(
        "X-Webhook-Timestamp",
        HeaderValue::from_str(&timestamp_ms.to_string())
            .map_err(|e| format!("bad timestamp header: {e}"))?,
    );
    headers.insert(
        "X-Event-Type",
        HeaderValue::from_str(event_type).map_err(|e| format!("bad event type header: {e}"))?,
    );
    headers.insert("User-Agent", HeaderValue::from_static(USER_AGENT));

    for (name, value) in custom_headers {
        if RESERVED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            warn!("Skipping custom header {name}: reserved");
            continue;
        }
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("bad custom header name {name:?}: {e}"))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| format!("bad custom header value: {e}"))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}
