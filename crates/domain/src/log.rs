use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome recorded for one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "TEXT", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Retrying,
    Failed,
}

/// One row of the append-only delivery audit log.
///
/// Rows outlive their jobs; the payload copy makes any attempt replayable
/// from the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DeliveryLog {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event_type: String,
    pub url: String,
    pub attempt_number: i32,
    pub status: LogStatus,
    pub http_status: Option<i32>,
    /// Response body capture, truncated to the configured cap.
    pub response_body: Option<String>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    /// Copy of the payload for replay.
    pub payload: String,
    pub created_at: DateTime<Utc>,
    /// Set only on success.
    pub delivered_at: Option<DateTime<Utc>>,
    /// Set only when status is `retrying`: wall-clock ms of the next attempt.
    pub next_retry_at: Option<i64>,
}

/// Log entry as produced by the queue worker, before the store assigns
/// id and created_at.
#[derive(Debug, Clone)]
pub struct NewDeliveryLog {
    pub webhook_id: Uuid,
    pub event_type: String,
    pub url: String,
    pub attempt_number: i32,
    pub status: LogStatus,
    pub http_status: Option<i32>,
    pub response_body: Option<String>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub payload: String,
    pub delivered_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<i64>,
}
