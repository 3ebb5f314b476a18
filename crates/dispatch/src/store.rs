/*!
 * Subscription Store
 *
 * Strongly-consistent store of webhooks, per-webhook counters, and the
 * append-only delivery log. The five counter mutations in `record_attempt`
 * are a single UPDATE statement, so they are atomic per row.
 */

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use sqlx::types::Json;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use forgehook_common::{Error, Result, generate_secret};
use forgehook_domain::log::{DeliveryLog, LogStatus, NewDeliveryLog};
use forgehook_domain::webhook::{CreateWebhookRequest, UpdateWebhookRequest, Webhook};

/// Idempotent schema setup, applied at startup.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS webhooks (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    secret TEXT NOT NULL,
    events TEXT NOT NULL,
    field_filters TEXT,
    timeout_ms INTEGER NOT NULL,
    retry_enabled INTEGER NOT NULL DEFAULT 1,
    max_retries INTEGER NOT NULL DEFAULT 3,
    custom_headers TEXT NOT NULL DEFAULT '{}',
    is_active INTEGER NOT NULL DEFAULT 1,
    total_deliveries INTEGER NOT NULL DEFAULT 0,
    successful_deliveries INTEGER NOT NULL DEFAULT 0,
    failed_deliveries INTEGER NOT NULL DEFAULT 0,
    consecutive_failures INTEGER NOT NULL DEFAULT 0,
    last_triggered_at TEXT,
    last_success_at TEXT,
    last_failure_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_webhooks_owner ON webhooks(owner_id);

CREATE TABLE IF NOT EXISTS webhook_logs (
    id TEXT PRIMARY KEY,
    webhook_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    url TEXT NOT NULL,
    attempt_number INTEGER NOT NULL,
    status TEXT NOT NULL,
    http_status INTEGER,
    response_body TEXT,
    duration_ms INTEGER NOT NULL,
    error_message TEXT,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL,
    delivered_at TEXT,
    next_retry_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_logs_webhook ON webhook_logs(webhook_id, created_at DESC);

CREATE TABLE IF NOT EXISTS queue_jobs (
    id TEXT PRIMARY KEY,
    webhook_id TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    payload TEXT NOT NULL,
    attempt_number INTEGER NOT NULL DEFAULT 1,
    status TEXT NOT NULL DEFAULT 'pending',
    scheduled_at INTEGER NOT NULL,
    last_attempt_at INTEGER,
    last_error TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_owner_due ON queue_jobs(owner_id, status, scheduled_at);
"#;

/// Apply the schema. Safe to call repeatedly.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!("Schema applied");
    Ok(())
}

/// Row shape for the webhooks table; JSON columns unwrap into domain types.
#[derive(sqlx::FromRow)]
struct WebhookRow {
    id: Uuid,
    owner_id: String,
    name: String,
    url: String,
    secret: String,
    events: Json<Vec<String>>,
    field_filters: Option<Json<HashMap<String, String>>>,
    timeout_ms: i64,
    retry_enabled: bool,
    max_retries: i32,
    custom_headers: Json<HashMap<String, String>>,
    is_active: bool,
    total_deliveries: i64,
    successful_deliveries: i64,
    failed_deliveries: i64,
    consecutive_failures: i32,
    last_triggered_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WebhookRow> for Webhook {
    fn from(r: WebhookRow) -> Self {
        Webhook {
            id: r.id,
            owner_id: r.owner_id,
            name: r.name,
            url: r.url,
            secret: r.secret,
            events: r.events.0,
            field_filters: r.field_filters.map(|f| f.0),
            timeout_ms: r.timeout_ms,
            retry_enabled: r.retry_enabled,
            max_retries: r.max_retries,
            custom_headers: r.custom_headers.0,
            is_active: r.is_active,
            total_deliveries: r.total_deliveries,
            successful_deliveries: r.successful_deliveries,
            failed_deliveries: r.failed_deliveries,
            consecutive_failures: r.consecutive_failures,
            last_triggered_at: r.last_triggered_at,
            last_success_at: r.last_success_at,
            last_failure_at: r.last_failure_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const WEBHOOK_COLUMNS: &str = "id, owner_id, name, url, secret, events, field_filters, \
     timeout_ms, retry_enabled, max_retries, custom_headers, is_active, \
     total_deliveries, successful_deliveries, failed_deliveries, consecutive_failures, \
     last_triggered_at, last_success_at, last_failure_at, created_at, updated_at";

/// Store of webhook subscriptions and delivery logs.
#[derive(Clone)]
pub struct SubscriptionStore {
    pool: SqlitePool,
}

impl SubscriptionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create a webhook: assigns id and a generated secret, counters at zero.
    ///
    /// Defaults for absent optional fields: 30 s timeout, retries enabled,
    /// max 3 attempts.
    pub async fn create(&self, owner_id: &str, req: CreateWebhookRequest) -> Result<Webhook> {
        let webhook = Webhook {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            name: req.name,
            url: req.url,
            secret: generate_secret(),
            events: req.events,
            field_filters: req.field_filters,
            timeout_ms: req.timeout_ms.unwrap_or(30_000),
            retry_enabled: req.retry_enabled.unwrap_or(true),
            max_retries: req.max_retries.unwrap_or(3),
            custom_headers: req.custom_headers.unwrap_or_default(),
            is_active: true,
            total_deliveries: 0,
            successful_deliveries: 0,
            failed_deliveries: 0,
            consecutive_failures: 0,
            last_triggered_at: None,
            last_success_at: None,
            last_failure_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        if webhook.events.is_empty() {
            return Err(Error::Validation("events must not be empty".to_string()));
        }

        sqlx::query(
            "INSERT INTO webhooks (id, owner_id, name, url, secret, events, field_filters, \
             timeout_ms, retry_enabled, max_retries, custom_headers, is_active, \
             total_deliveries, successful_deliveries, failed_deliveries, consecutive_failures, \
             created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, 0, 0, ?, ?)",
        )
        .bind(webhook.id)
        .bind(&webhook.owner_id)
        .bind(&webhook.name)
        .bind(&webhook.url)
        .bind(&webhook.secret)
        .bind(Json(&webhook.events))
        .bind(webhook.field_filters.as_ref().map(Json))
        .bind(webhook.timeout_ms)
        .bind(webhook.retry_enabled)
        .bind(webhook.max_retries)
        .bind(Json(&webhook.custom_headers))
        .bind(webhook.is_active)
        .bind(webhook.created_at)
        .bind(webhook.updated_at)
        .execute(&self.pool)
        .await?;

        info!("Created webhook {} for owner {}", webhook.id, owner_id);
        Ok(webhook)
    }

    pub async fn by_id(&self, id: Uuid) -> Result<Option<Webhook>> {
        let row: Option<WebhookRow> =
            sqlx::query_as(&format!("SELECT {WEBHOOK_COLUMNS} FROM webhooks WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Webhook::from))
    }

    pub async fn by_owner(&self, owner_id: &str, active_only: bool) -> Result<Vec<Webhook>> {
        let sql = if active_only {
            format!(
                "SELECT {WEBHOOK_COLUMNS} FROM webhooks \
                 WHERE owner_id = ? AND is_active = 1 ORDER BY created_at DESC"
            )
        } else {
            format!(
                "SELECT {WEBHOOK_COLUMNS} FROM webhooks \
                 WHERE owner_id = ? ORDER BY created_at DESC"
            )
        };

        let rows: Vec<WebhookRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Webhook::from).collect())
    }

    /// Active webhooks of `owner_id` subscribed to `kind` (or the `*`
    /// wildcard). The events column is JSON, so the subscription check runs
    /// on the decoded rows.
    pub async fn by_owner_and_event(&self, owner_id: &str, kind: &str) -> Result<Vec<Webhook>> {
        let hooks = self.by_owner(owner_id, true).await?;
        Ok(hooks.into_iter().filter(|w| w.subscribes_to(kind)).collect())
    }

    /// Apply a partial update; absent fields are left untouched.
    pub async fn update(&self, id: Uuid, req: UpdateWebhookRequest) -> Result<Webhook> {
        let Some(mut webhook) = self.by_id(id).await? else {
            return Err(Error::NotFound(format!("webhook {id}")));
        };

        if let Some(name) = req.name {
            webhook.name = name;
        }
        if let Some(url) = req.url {
            webhook.url = url;
        }
        if let Some(events) = req.events {
            if events.is_empty() {
                return Err(Error::Validation("events must not be empty".to_string()));
            }
            webhook.events = events;
        }
        if let Some(filters) = req.field_filters {
            webhook.field_filters = Some(filters);
        }
        if let Some(timeout_ms) = req.timeout_ms {
            webhook.timeout_ms = timeout_ms;
        }
        if let Some(retry_enabled) = req.retry_enabled {
            webhook.retry_enabled = retry_enabled;
        }
        if let Some(max_retries) = req.max_retries {
            webhook.max_retries = max_retries;
        }
        if let Some(headers) = req.custom_headers {
            webhook.custom_headers = headers;
        }
        if let Some(is_active) = req.is_active {
            webhook.is_active = is_active;
        }
        webhook.updated_at = Utc::now();

        sqlx::query(
            "UPDATE webhooks SET name = ?, url = ?, events = ?, field_filters = ?, \
             timeout_ms = ?, retry_enabled = ?, max_retries = ?, custom_headers = ?, \
             is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&webhook.name)
        .bind(&webhook.url)
        .bind(Json(&webhook.events))
        .bind(webhook.field_filters.as_ref().map(Json))
        .bind(webhook.timeout_ms)
        .bind(webhook.retry_enabled)
        .bind(webhook.max_retries)
        .bind(Json(&webhook.custom_headers))
        .bind(webhook.is_active)
        .bind(webhook.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(webhook)
    }

    /// Replace the webhook's secret; subsequent deliveries sign with it.
    pub async fn rotate_secret(&self, id: Uuid) -> Result<String> {
        let secret = generate_secret();
        let result = sqlx::query("UPDATE webhooks SET secret = ?, updated_at = ? WHERE id = ?")
            .bind(&secret)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("webhook {id}")));
        }
        Ok(secret)
    }

    /// Delete a webhook and cascade to its queue jobs. Logs are retained
    /// for audit.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM queue_jobs WHERE webhook_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM webhooks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("webhook {id}")));
        }

        info!("Deleted webhook {} (jobs cascaded, logs retained)", id);
        Ok(())
    }

    /// Record a settled delivery on the webhook's counters.
    ///
    /// Mutates lastTriggered, lastSuccess/lastFailure, consecutiveFailures,
    /// totalDeliveries and the matching outcome counter in one statement.
    pub async fn record_attempt(&self, webhook_id: Uuid, success: bool, elapsed_ms: u64) -> Result<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE webhooks SET \
             total_deliveries = total_deliveries + 1, \
             successful_deliveries = successful_deliveries + (CASE WHEN ? THEN 1 ELSE 0 END), \
             failed_deliveries = failed_deliveries + (CASE WHEN ? THEN 0 ELSE 1 END), \
             consecutive_failures = CASE WHEN ? THEN 0 ELSE consecutive_failures + 1 END, \
             last_triggered_at = ?, \
             last_success_at = CASE WHEN ? THEN ? ELSE last_success_at END, \
             last_failure_at = CASE WHEN ? THEN last_failure_at ELSE ? END, \
             updated_at = ? \
             WHERE id = ?",
        )
        .bind(success)
        .bind(success)
        .bind(success)
        .bind(now)
        .bind(success)
        .bind(now)
        .bind(success)
        .bind(now)
        .bind(now)
        .bind(webhook_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("webhook {webhook_id}")));
        }

        debug!(
            "Recorded attempt: webhook={} success={} elapsed={}ms",
            webhook_id, success, elapsed_ms
        );
        Ok(())
    }

    /// Append one delivery-log row.
    pub async fn append_log(&self, entry: NewDeliveryLog) -> Result<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO webhook_logs (id, webhook_id, event_type, url, attempt_number, status, \
             http_status, response_body, duration_ms, error_message, payload, created_at, \
             delivered_at, next_retry_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(entry.webhook_id)
        .bind(&entry.event_type)
        .bind(&entry.url)
        .bind(entry.attempt_number)
        .bind(entry.status)
        .bind(entry.http_status)
        .bind(&entry.response_body)
        .bind(entry.duration_ms)
        .bind(&entry.error_message)
        .bind(&entry.payload)
        .bind(Utc::now())
        .bind(entry.delivered_at)
        .bind(entry.next_retry_at)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Paginated logs for one webhook, newest first. Returns rows plus the
    /// total matching count.
    pub async fn logs_by_webhook(
        &self,
        webhook_id: Uuid,
        limit: i64,
        offset: i64,
        status_filter: Option<LogStatus>,
    ) -> Result<(Vec<DeliveryLog>, i64)> {
        let (rows, total) = match status_filter {
            Some(status) => {
                let rows: Vec<DeliveryLog> = sqlx::query_as(
                    "SELECT * FROM webhook_logs WHERE webhook_id = ? AND status = ? \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(webhook_id)
                .bind(status)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                let total: (i64,) = sqlx::query_as(
                    "SELECT COUNT(*) FROM webhook_logs WHERE webhook_id = ? AND status = ?",
                )
                .bind(webhook_id)
                .bind(status)
                .fetch_one(&self.pool)
                .await?;

                (rows, total.0)
            }
            None => {
                let rows: Vec<DeliveryLog> = sqlx::query_as(
                    "SELECT * FROM webhook_logs WHERE webhook_id = ? \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(webhook_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                let total: (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM webhook_logs WHERE webhook_id = ?")
                        .bind(webhook_id)
                        .fetch_one(&self.pool)
                        .await?;

                (rows, total.0)
            }
        };

        Ok((rows, total))
    }

    /// Most recent failed attempts for one webhook.
    pub async fn recent_failures(&self, webhook_id: Uuid, limit: i64) -> Result<Vec<DeliveryLog>> {
        let rows: Vec<DeliveryLog> = sqlx::query_as(
            "SELECT * FROM webhook_logs WHERE webhook_id = ? AND status = 'failed' \
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(webhook_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn log_by_id(&self, log_id: Uuid) -> Result<Option<DeliveryLog>> {
        let row: Option<DeliveryLog> = sqlx::query_as("SELECT * FROM webhook_logs WHERE id = ?")
            .bind(log_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Remove log rows older than `max_age_ms`. Retention sweep, default 30 d.
    pub async fn prune_logs(&self, max_age_ms: i64) -> Result<u64> {
        let cutoff = Utc::now() - ChronoDuration::milliseconds(max_age_ms);

        let result = sqlx::query("DELETE FROM webhook_logs WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!("Pruned {} expired log rows", result.rows_affected());
        }
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgehook_common::create_pool;

    async fn test_store() -> SubscriptionStore {
        let pool = create_pool("sqlite::memory:", 1).await.unwrap();
        init_schema(&pool).await.unwrap();
        SubscriptionStore::new(pool)
    }

    fn create_req(events: Vec<&str>) -> CreateWebhookRequest {
        CreateWebhookRequest {
            name: "test hook".to_string(),
            url: "https://hooks.example.test/in".to_string(),
            events: events.into_iter().map(String::from).collect(),
            field_filters: None,
            timeout_ms: None,
            retry_enabled: None,
            max_retries: None,
            custom_headers: None,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_secret() {
        let store = test_store().await;
        let hook = store.create("user-1", create_req(vec!["app.created"])).await.unwrap();

        assert_eq!(hook.owner_id, "user-1");
        assert_eq!(hook.secret.len(), 64);
        assert_eq!(hook.max_retries, 3);
        assert_eq!(hook.timeout_ms, 30_000);
        assert_eq!(hook.total_deliveries, 0);
        assert!(hook.is_active);

        let fetched = store.by_id(hook.id).await.unwrap().unwrap();
        assert_eq!(fetched.secret, hook.secret);
        assert_eq!(fetched.events, vec!["app.created"]);
    }

    #[tokio::test]
    async fn test_empty_events_rejected() {
        let store = test_store().await;
        let result = store.create("user-1", create_req(vec![])).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_by_owner_and_event_honors_wildcard_and_active() {
        let store = test_store().await;
        let exact = store.create("u", create_req(vec!["app.created"])).await.unwrap();
        let wild = store.create("u", create_req(vec!["*"])).await.unwrap();
        let other = store.create("u", create_req(vec!["payment.success"])).await.unwrap();
        let inactive = store.create("u", create_req(vec!["app.created"])).await.unwrap();

        store
            .update(
                inactive.id,
                UpdateWebhookRequest { is_active: Some(false), ..Default::default() },
            )
            .await
            .unwrap();

        let matched = store.by_owner_and_event("u", "app.created").await.unwrap();
        let ids: Vec<Uuid> = matched.iter().map(|w| w.id).collect();

        assert!(ids.contains(&exact.id));
        assert!(ids.contains(&wild.id));
        assert!(!ids.contains(&other.id));
        assert!(!ids.contains(&inactive.id));
    }

    #[tokio::test]
    async fn test_record_attempt_counters() {
        let store = test_store().await;
        let hook = store.create("u", create_req(vec!["*"])).await.unwrap();

        store.record_attempt(hook.id, false, 120).await.unwrap();
        store.record_attempt(hook.id, false, 80).await.unwrap();

        let w = store.by_id(hook.id).await.unwrap().unwrap();
        assert_eq!(w.total_deliveries, 2);
        assert_eq!(w.failed_deliveries, 2);
        assert_eq!(w.successful_deliveries, 0);
        assert_eq!(w.consecutive_failures, 2);
        assert!(w.last_failure_at.is_some());
        assert!(w.last_success_at.is_none());

        store.record_attempt(hook.id, true, 95).await.unwrap();

        let w = store.by_id(hook.id).await.unwrap().unwrap();
        assert_eq!(w.total_deliveries, 3);
        assert_eq!(w.successful_deliveries, 1);
        assert_eq!(w.failed_deliveries, 2);
        // Any success resets the streak
        assert_eq!(w.consecutive_failures, 0);
        assert!(w.last_success_at.is_some());
        // Identity: total = successes + failures
        assert_eq!(w.total_deliveries, w.successful_deliveries + w.failed_deliveries);
    }

    #[tokio::test]
    async fn test_rotate_secret_changes_value() {
        let store = test_store().await;
        let hook = store.create("u", create_req(vec!["*"])).await.unwrap();

        let new_secret = store.rotate_secret(hook.id).await.unwrap();
        assert_ne!(new_secret, hook.secret);

        let fetched = store.by_id(hook.id).await.unwrap().unwrap();
        assert_eq!(fetched.secret, new_secret);
    }

    #[tokio::test]
    async fn test_delete_cascades_jobs_retains_logs() {
        let store = test_store().await;
        let hook = store.create("u", create_req(vec!["*"])).await.unwrap();

        sqlx::query(
            "INSERT INTO queue_jobs (id, webhook_id, owner_id, event_type, payload, scheduled_at, created_at) \
             VALUES (?, ?, 'u', 'app.created', '{}', 0, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(hook.id)
        .bind(Utc::now())
        .execute(store.pool())
        .await
        .unwrap();

        store
            .append_log(NewDeliveryLog {
                webhook_id: hook.id,
                event_type: "app.created".to_string(),
                url: hook.url.clone(),
                attempt_number: 1,
                status: LogStatus::Failed,
                http_status: Some(500),
                response_body: None,
                duration_ms: 10,
                error_message: Some("boom".to_string()),
                payload: "{}".to_string(),
                delivered_at: None,
                next_retry_at: None,
            })
            .await
            .unwrap();

        store.delete(hook.id).await.unwrap();

        let jobs: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM queue_jobs WHERE webhook_id = ?")
            .bind(hook.id)
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(jobs.0, 0);

        let (logs, total) = store.logs_by_webhook(hook.id, 10, 0, None).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(logs.len(), 1);
    }

    #[tokio::test]
    async fn test_logs_pagination_and_filter() {
        let store = test_store().await;
        let hook = store.create("u", create_req(vec!["*"])).await.unwrap();

        for i in 0..5 {
            let status = if i % 2 == 0 { LogStatus::Success } else { LogStatus::Failed };
            store
                .append_log(NewDeliveryLog {
                    webhook_id: hook.id,
                    event_type: "app.created".to_string(),
                    url: hook.url.clone(),
                    attempt_number: 1,
                    status,
                    http_status: Some(if i % 2 == 0 { 200 } else { 500 }),
                    response_body: None,
                    duration_ms: i,
                    error_message: None,
                    payload: "{}".to_string(),
                    delivered_at: None,
                    next_retry_at: None,
                })
                .await
                .unwrap();
        }

        let (page, total) = store.logs_by_webhook(hook.id, 2, 0, None).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);

        let (failed, failed_total) = store
            .logs_by_webhook(hook.id, 10, 0, Some(LogStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed_total, 2);
        assert!(failed.iter().all(|l| l.status == LogStatus::Failed));

        let failures = store.recent_failures(hook.id, 10).await.unwrap();
        assert_eq!(failures.len(), 2);
    }

    #[tokio::test]
    async fn test_prune_logs_by_age() {
        let store = test_store().await;
        let hook = store.create("u", create_req(vec!["*"])).await.unwrap();

        // An old row, inserted directly with a back-dated created_at
        sqlx::query(
            "INSERT INTO webhook_logs (id, webhook_id, event_type, url, attempt_number, status, \
             duration_ms, payload, created_at) VALUES (?, ?, 'app.created', 'https://x', 1, 'failed', 0, '{}', ?)",
        )
        .bind(Uuid::new_v4())
        .bind(hook.id)
        .bind(Utc::now() - ChronoDuration::days(40))
        .execute(store.pool())
        .await
        .unwrap();

        store
            .append_log(NewDeliveryLog {
                webhook_id: hook.id,
                event_type: "app.created".to_string(),
                url: hook.url.clone(),
                attempt_number: 1,
                status: LogStatus::Success,
                http_status: Some(200),
                response_body: None,
                duration_ms: 5,
                error_message: None,
                payload: "{}".to_string(),
                delivered_at: Some(Utc::now()),
                next_retry_at: None,
            })
            .await
            .unwrap();

        let removed = store.prune_logs(30 * 24 * 3600 * 1000).await.unwrap();
        assert_eq!(removed, 1);

        let (_, total) = store.logs_by_webhook(hook.id, 10, 0, None).await.unwrap();
        assert_eq!(total, 1);
    }
}
