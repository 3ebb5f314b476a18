/*!
 * Prometheus Metrics for the Delivery Engine
 *
 * Exposed on the admin API's /metrics endpoint for Prometheus scraping.
 */

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, TextEncoder, opts, register_histogram_vec,
    register_int_counter_vec,
};

lazy_static! {
    /// Jobs accepted into per-owner queues
    pub static ref JOBS_ENQUEUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("webhook_jobs_enqueued_total", "Total jobs enqueued"),
        &["event_type"]
    )
    .expect("metric can be created");

    /// Delivery attempts counter
    pub static ref DELIVERY_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("webhook_delivery_attempts_total", "Total number of delivery attempts"),
        &["webhook", "success"]
    )
    .expect("metric can be created");

    /// Delivery duration histogram
    pub static ref DELIVERY_DURATION: HistogramVec = register_histogram_vec!(
        "webhook_delivery_duration_seconds",
        "Webhook delivery duration in seconds",
        &["webhook"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("metric can be created");

    /// HTTP status codes received from receivers
    pub static ref HTTP_RESPONSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("webhook_delivery_http_responses_total", "Total HTTP responses by status code"),
        &["status_code"]
    )
    .expect("metric can be created");

    /// Retry attempts scheduled
    pub static ref RETRY_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("webhook_delivery_retry_attempts_total", "Total number of retry attempts"),
        &["webhook"]
    )
    .expect("metric can be created");

    /// Events dropped before enqueue (validation, size cap, unknown kind)
    pub static ref EVENTS_REJECTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("webhook_events_rejected_total", "Events rejected before enqueue"),
        &["reason"]
    )
    .expect("metric can be created");
}

/// Render metrics in Prometheus format
pub fn render_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
