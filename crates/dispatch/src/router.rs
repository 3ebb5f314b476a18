/*!
 * Event Router
 *
 * Entry point for event producers. Validates and enriches the payload, finds
 * the owner's matching subscriptions, and enqueues one job per match. `emit`
 * is fire-and-forget past validation: delivery outcomes land in the audit
 * log and the webhook counters, never in the producer's return value.
 */

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use forgehook_common::{Error, Result, now_ms};
use forgehook_config::DeliveryConfig;
use forgehook_domain::webhook::Webhook;

use crate::metrics;
use crate::notifier::{Notifier, WorkflowMessage};
use crate::queue::ShardManager;
use crate::store::SubscriptionStore;
use crate::validator;

/// Event type used by admin test-sends; not part of the subscription set.
pub const TEST_EVENT_TYPE: &str = "test";

/// What an accepted emit produced.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EmitReceipt {
    pub matched: usize,
    pub job_ids: Vec<Uuid>,
}

pub struct EventRouter {
    store: SubscriptionStore,
    shards: Arc<ShardManager>,
    notifier: Notifier,
    config: DeliveryConfig,
}

impl EventRouter {
    pub fn new(
        store: SubscriptionStore,
        shards: Arc<ShardManager>,
        notifier: Notifier,
        config: DeliveryConfig,
    ) -> Self {
        Self { store, shards, notifier, config }
    }

    pub fn store(&self) -> &SubscriptionStore {
        &self.store
    }

    pub fn shards(&self) -> &Arc<ShardManager> {
        &self.shards
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Emit a platform event on behalf of `owner_id`.
    ///
    /// Input errors (unknown kind, shape violation, oversized payload) are
    /// returned synchronously and nothing is enqueued. Matching and enqueue
    /// failures for individual subscriptions are logged and skipped; one bad
    /// subscription never blocks the rest of the fan-out.
    pub async fn emit(&self, owner_id: &str, kind: &str, mut payload: Value) -> Result<EmitReceipt> {
        let errors = validator::validate(kind, &payload);
        if !errors.is_empty() {
            metrics::EVENTS_REJECTED_TOTAL.with_label_values(&["shape"]).inc();
            warn!("Dropping invalid {kind} event from {owner_id}: {}", errors.join("; "));
            return Err(Error::Validation(errors.join("; ")));
        }

        self.enrich(owner_id, &mut payload);
        let frozen = self.freeze(&payload)?;

        let subs = self.store.by_owner_and_event(owner_id, kind).await?;
        if subs.is_empty() {
            debug!("No active subscriptions for {kind} (owner {owner_id})");
            return Ok(EmitReceipt { matched: 0, job_ids: vec![] });
        }

        let mut matched = 0;
        let mut job_ids = Vec::with_capacity(subs.len());
        for webhook in &subs {
            if !webhook.matches_filters(&payload) {
                debug!("Webhook {} filtered out {kind} by field filters", webhook.id);
                continue;
            }
            matched += 1;
            match self.enqueue_for(webhook, kind, &frozen).await {
                Ok(job_id) => job_ids.push(job_id),
                Err(e) => warn!("Enqueue failed for webhook {}: {e}", webhook.id),
            }
        }

        info!(
            "Event {kind} from {owner_id}: {} of {} subscriptions enqueued",
            job_ids.len(),
            subs.len()
        );

        Ok(EmitReceipt { matched, job_ids })
    }

    /// Deliver straight to one webhook, bypassing subscription lookup.
    ///
    /// Used by the admin test-send and log replay. Payload-shape validation
    /// is skipped (the payload comes from the admin surface, not a
    /// producer); the size cap still applies.
    pub async fn emit_to_one(
        &self,
        webhook_id: Uuid,
        event_type: &str,
        mut payload: Value,
    ) -> Result<Uuid> {
        let Some(webhook) = self.store.by_id(webhook_id).await? else {
            return Err(Error::NotFound(format!("webhook {webhook_id}")));
        };

        self.enrich(&webhook.owner_id, &mut payload);
        let frozen = self.freeze(&payload)?;

        self.enqueue_for(&webhook, event_type, &frozen).await
    }

    /// Default the timestamp; producers may pin their own.
    fn enrich(&self, owner_id: &str, payload: &mut Value) {
        if let Some(obj) = payload.as_object_mut() {
            obj.entry("timestamp").or_insert_with(|| now_ms().into());
            obj.entry("userId").or_insert_with(|| owner_id.into());
        }
    }

    /// Serialize once; these exact bytes get signed and delivered.
    fn freeze(&self, payload: &Value) -> Result<String> {
        let frozen = serde_json::to_string(payload)?;
        if frozen.len() > self.config.payload_size_cap_bytes {
            metrics::EVENTS_REJECTED_TOTAL.with_label_values(&["size"]).inc();
            return Err(Error::Validation(format!(
                "payload exceeds {} byte cap",
                self.config.payload_size_cap_bytes
            )));
        }
        Ok(frozen)
    }

    async fn enqueue_for(&self, webhook: &Webhook, event_type: &str, frozen: &str) -> Result<Uuid> {
        let job_id = self.shards.enqueue(webhook, event_type, frozen).await?;

        self.notifier.notify(
            &webhook.owner_id,
            WorkflowMessage::Triggered {
                job_id,
                webhook_id: webhook.id,
                event_type: event_type.to_string(),
                timestamp: now_ms(),
            },
        );

        Ok(job_id)
    }

    /// Stop all shard workers; in-flight deliveries complete first.
    pub async fn shutdown(&self) {
        self.shards.shutdown().await;
    }
}

// Process-wide router handle. Producers deep inside the platform reach the
// router through `global::get()`; its lifecycle is init -> run -> shutdown,
// and tests call `reset()` between runs.
pub mod global {
    use super::EventRouter;
    use once_cell::sync::Lazy;
    use std::sync::{Arc, RwLock};

    static ROUTER: Lazy<RwLock<Option<Arc<EventRouter>>>> = Lazy::new(|| RwLock::new(None));

    /// Install the process-wide router. Replaces any previous instance.
    pub fn init(router: Arc<EventRouter>) {
        *ROUTER.write().expect("router lock poisoned") = Some(router);
    }

    /// The installed router, if `init` has run.
    pub fn get() -> Option<Arc<EventRouter>> {
        ROUTER.read().expect("router lock poisoned").clone()
    }

    /// Signal shards to drain and uninstall the router.
    pub async fn shutdown() {
        let router = ROUTER.write().expect("router lock poisoned").take();
        if let Some(router) = router {
            router.shutdown().await;
        }
    }

    /// Test hook: drop the installed router without draining.
    pub fn reset() {
        *ROUTER.write().expect("router lock poisoned") = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DeliveryClient;
    use crate::store::init_schema;
    use forgehook_common::create_pool;
    use forgehook_domain::webhook::CreateWebhookRequest;
    use serde_json::json;

    async fn build_router() -> EventRouter {
        let pool = create_pool("sqlite::memory:", 1).await.unwrap();
        init_schema(&pool).await.unwrap();

        let store = SubscriptionStore::new(pool.clone());
        let client = Arc::new(DeliveryClient::new(65_536, true).unwrap());
        let notifier = Notifier::new();
        let config = DeliveryConfig::default();
        let shards = Arc::new(ShardManager::new(
            pool,
            store.clone(),
            client,
            notifier.clone(),
            config.clone(),
        ));

        EventRouter::new(store, shards, notifier, config)
    }

    fn req(events: Vec<&str>) -> CreateWebhookRequest {
        CreateWebhookRequest {
            name: "t".to_string(),
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
    async fn test_invalid_payload_is_rejected_and_not_enqueued() {
        let router = build_router().await;
        router.store().create("u", req(vec!["*"])).await.unwrap();

        let result = router.emit("u", "payment.success", json!({"userId": "u"})).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        let status = router.shards().queue_for("u").status().await.unwrap();
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_rejected() {
        let router = build_router().await;
        let result = router.emit("u", "made.up", json!({})).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_oversized_payload_is_rejected() {
        let router = build_router().await;
        router.store().create("u", req(vec!["*"])).await.unwrap();

        let big = json!({
            "userId": "u",
            "amount": 1,
            "currency": "USD",
            "blob": "x".repeat(2 * 1024 * 1024),
        });

        let result = router.emit("u", "payment.success", big).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        let status = router.shards().queue_for("u").status().await.unwrap();
        assert_eq!(status.pending + status.processing + status.succeeded + status.failed, 0);
    }

    #[tokio::test]
    async fn test_no_subscriptions_is_a_quiet_no_op() {
        let router = build_router().await;

        let receipt = router
            .emit("u", "user.verified", json!({"userId": "u"}))
            .await
            .unwrap();

        assert_eq!(receipt.matched, 0);
        assert!(receipt.job_ids.is_empty());
    }

    #[tokio::test]
    async fn test_fan_out_one_job_per_match() {
        let router = build_router().await;
        router.store().create("u", req(vec!["payment.success"])).await.unwrap();
        router.store().create("u", req(vec!["*"])).await.unwrap();
        router.store().create("u", req(vec!["app.created"])).await.unwrap();

        let receipt = router
            .emit(
                "u",
                "payment.success",
                json!({"userId": "u", "amount": 29, "currency": "USD"}),
            )
            .await
            .unwrap();

        assert_eq!(receipt.matched, 2);
        assert_eq!(receipt.job_ids.len(), 2);

        router.shutdown().await;
    }

    #[tokio::test]
    async fn test_timestamp_enrichment_preserves_producer_value() {
        let router = build_router().await;
        router.store().create("u", req(vec!["*"])).await.unwrap();

        let pinned = 1_700_000_000_000i64;
        router
            .emit(
                "u",
                "payment.success",
                json!({"userId": "u", "amount": 1, "currency": "USD", "timestamp": pinned}),
            )
            .await
            .unwrap();

        let jobs = router.shards().queue_for("u").recent_jobs(10, 0).await.unwrap();
        assert_eq!(jobs.len(), 1);
        let stored: Value = serde_json::from_str(&jobs[0].payload).unwrap();
        assert_eq!(stored["timestamp"], pinned);

        router.shutdown().await;
    }

    #[tokio::test]
    async fn test_field_filters_narrow_the_fan_out() {
        let router = build_router().await;
        router.store().create("u", req(vec!["app.deployed"])).await.unwrap();

        let mut filtered = req(vec!["app.deployed"]);
        let mut filters = std::collections::HashMap::new();
        filters.insert("environment".to_string(), "production".to_string());
        filtered.field_filters = Some(filters);
        router.store().create("u", filtered).await.unwrap();

        let receipt = router
            .emit(
                "u",
                "app.deployed",
                json!({
                    "appId": "a", "appName": "n", "userId": "u",
                    "deploymentUrl": "https://d.example.com", "environment": "preview",
                }),
            )
            .await
            .unwrap();

        // The production-only webhook sits out the preview deploy
        assert_eq!(receipt.matched, 1);
        assert_eq!(receipt.job_ids.len(), 1);

        router.shutdown().await;
    }

    #[tokio::test]
    async fn test_emit_to_one_unknown_webhook() {
        let router = build_router().await;
        let result = router
            .emit_to_one(Uuid::new_v4(), TEST_EVENT_TYPE, json!({"test": true}))
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_global_init_get_reset() {
        global::reset();
        assert!(global::get().is_none());

        let router = Arc::new(build_router().await);
        global::init(Arc::clone(&router));
        assert!(global::get().is_some());

        global::reset();
        assert!(global::get().is_none());
    }
}
