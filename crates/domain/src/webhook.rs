use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

/// A user-configured webhook subscription.
///
/// Identity is the opaque `id`; everything else is mutable through the admin
/// surface. Counters and timestamps are maintained by the store and only ever
/// change through `record_attempt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub url: String,
    pub secret: String,
    /// Subscribed event kinds; `*` subscribes to everything.
    pub events: Vec<String>,
    pub field_filters: Option<HashMap<String, String>>,
    pub timeout_ms: i64,
    pub retry_enabled: bool,
    pub max_retries: i32,
    pub custom_headers: HashMap<String, String>,
    pub is_active: bool,
    pub total_deliveries: i64,
    pub successful_deliveries: i64,
    pub failed_deliveries: i64,
    pub consecutive_failures: i32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Webhook {
    /// Does this webhook subscribe to `kind`? `*` acts as a wildcard.
    pub fn subscribes_to(&self, kind: &str) -> bool {
        self.events.iter().any(|e| e == "*" || e == kind)
    }

    /// Apply the optional field filters: every configured key must be
    /// present in the payload with exactly the configured value. Non-string
    /// payload values compare by their JSON rendering.
    pub fn matches_filters(&self, payload: &serde_json::Value) -> bool {
        let Some(filters) = &self.field_filters else {
            return true;
        };

        filters.iter().all(|(key, want)| match payload.get(key) {
            Some(serde_json::Value::String(s)) => s == want,
            Some(other) => other.to_string() == *want,
            None => false,
        })
    }
}

/// Request to create a webhook subscription
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWebhookRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    pub url: String,

    #[validate(length(min = 1, message = "At least one event kind is required"))]
    pub events: Vec<String>,

    pub field_filters: Option<HashMap<String, String>>,

    #[validate(range(min = 1000, max = 120_000))]
    pub timeout_ms: Option<i64>,

    pub retry_enabled: Option<bool>,

    #[validate(range(min = 0, max = 10))]
    pub max_retries: Option<i32>,

    pub custom_headers: Option<HashMap<String, String>>,
}

/// Request to update a webhook; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateWebhookRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    pub url: Option<String>,

    #[validate(length(min = 1, message = "At least one event kind is required"))]
    pub events: Option<Vec<String>>,

    pub field_filters: Option<HashMap<String, String>>,

    #[validate(range(min = 1000, max = 120_000))]
    pub timeout_ms: Option<i64>,

    pub retry_enabled: Option<bool>,

    #[validate(range(min = 0, max = 10))]
    pub max_retries: Option<i32>,

    pub custom_headers: Option<HashMap<String, String>>,

    pub is_active: Option<bool>,
}

/// Webhook as returned by the admin surface.
///
/// Mirrors the stored row and adds `needs_attention` when consecutive
/// failures reach the operator threshold.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
    pub field_filters: Option<HashMap<String, String>>,
    pub timeout_ms: i64,
    pub retry_enabled: bool,
    pub max_retries: i32,
    pub custom_headers: HashMap<String, String>,
    pub is_active: bool,
    pub total_deliveries: i64,
    pub successful_deliveries: i64,
    pub failed_deliveries: i64,
    pub consecutive_failures: i32,
    pub needs_attention: bool,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Consecutive-failure count at which a webhook is flagged for operator
/// attention. Pausing is an operator action, never automatic.
pub const NEEDS_ATTENTION_THRESHOLD: i32 = 20;

impl From<Webhook> for WebhookResponse {
    fn from(w: Webhook) -> Self {
        Self {
            needs_attention: w.consecutive_failures >= NEEDS_ATTENTION_THRESHOLD,
            id: w.id,
            owner_id: w.owner_id,
            name: w.name,
            url: w.url,
            secret: w.secret,
            events: w.events,
            field_filters: w.field_filters,
            timeout_ms: w.timeout_ms,
            retry_enabled: w.retry_enabled,
            max_retries: w.max_retries,
            custom_headers: w.custom_headers,
            is_active: w.is_active,
            total_deliveries: w.total_deliveries,
            successful_deliveries: w.successful_deliveries,
            failed_deliveries: w.failed_deliveries,
            consecutive_failures: w.consecutive_failures,
            last_triggered_at: w.last_triggered_at,
            last_success_at: w.last_success_at,
            last_failure_at: w.last_failure_at,
            created_at: w.created_at,
            updated_at: w.updated_at,
        }
    }
}
