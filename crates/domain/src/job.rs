use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery job state machine: `pending → processing → (success | failed |
/// pending-again)`. `success` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "TEXT", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }
}

/// One queued delivery.
///
/// The payload is frozen at enqueue time; the webhook's url and secret are
/// NOT copied here — the shard re-fetches the live row before every attempt
/// so secret rotation and URL edits take effect mid-flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct QueueJob {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub owner_id: String,
    pub event_type: String,
    /// Frozen JSON payload bytes, exactly what gets signed and sent.
    pub payload: String,
    /// 1-based attempt counter.
    pub attempt_number: i32,
    pub status: JobStatus,
    /// Earliest wall-clock ms at which this job may run.
    pub scheduled_at: i64,
    pub last_attempt_at: Option<i64>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QueueJob {
    /// A job is due when it is pending and its schedule time has passed.
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.status == JobStatus::Pending && self.scheduled_at <= now_ms
    }
}

/// Aggregate queue counts for one owner's shard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStatus {
    pub pending: i64,
    pub processing: i64,
    pub succeeded: i64,
    pub failed: i64,
}
