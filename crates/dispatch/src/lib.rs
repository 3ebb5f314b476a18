/*!
 * ForgeHook Delivery Engine
 *
 * The core of the webhook subsystem:
 *
 * - [`validator`] - per-kind payload contracts, enforced before enqueue
 * - [`client`] - outbound HTTPS POST with the signed wire protocol
 * - [`store`] - webhooks, counters, and the append-only delivery log
 * - [`queue`] - durable per-owner queue shards with bounded retries
 * - [`router`] - event fan-out from producers to matching subscriptions
 * - [`notifier`] - live-session progress messages
 * - [`metrics`] - Prometheus counters for the whole engine
 *
 * ```text
 * Producer -> EventRouter -> validator -> store lookup -> ShardManager.enqueue
 *                 |                                            |
 *             Notifier <---- QueueShard worker <---------------+
 *                                |
 *                        DeliveryClient.deliver
 *                                |
 *                  store.append_log / store.record_attempt
 * ```
 */

pub mod client;
pub mod metrics;
pub mod notifier;
pub mod queue;
pub mod router;
pub mod store;
pub mod validator;

pub use client::{DeliveryClient, DeliveryResult};
pub use notifier::{Notifier, WorkflowMessage};
pub use queue::{ShardManager, ShardQueue};
pub use router::{EmitReceipt, EventRouter, TEST_EVENT_TYPE};
pub use store::{SubscriptionStore, init_schema};

use std::sync::Arc;

use forgehook_common::Result;
use forgehook_config::DeliveryConfig;

/// Wire the whole engine onto one database pool.
///
/// Applies the schema and returns an [`EventRouter`] ready for
/// [`router::global::init`].
pub async fn build_engine(
    pool: sqlx::SqlitePool,
    config: DeliveryConfig,
) -> Result<Arc<EventRouter>> {
    init_schema(&pool).await?;

    let store = SubscriptionStore::new(pool.clone());
    let client = Arc::new(
        DeliveryClient::new(config.response_body_cap_bytes, config.allow_private_targets)
            .map_err(forgehook_common::Error::Internal)?,
    );
    let notifier = Notifier::new();
    let shards = Arc::new(ShardManager::new(
        pool,
        store.clone(),
        client,
        notifier.clone(),
        config.clone(),
    ));

    Ok(Arc::new(EventRouter::new(store, shards, notifier, config)))
}
