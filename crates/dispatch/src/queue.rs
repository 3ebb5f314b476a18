/*!
 * Per-Owner Delivery Queue
 *
 * One logical shard per owner. Each shard owns the owner's slice of the
 * durable `queue_jobs` table and a single worker task that drains it:
 * one delivery in flight per owner, full parallelism across owners.
 *
 * ```text
 * enqueue ──> queue_jobs (owner A) ──> Shard A worker ──> DeliveryClient
 *        \──> queue_jobs (owner B) ──> Shard B worker ──> DeliveryClient
 * ```
 *
 * Within a shard the worker:
 * 1. Picks up to 10 due jobs (pending, scheduled_at <= now), oldest first
 * 2. Marks each `processing`, fetches the live webhook row
 * 3. Delivers and finalizes: success / schedule retry / failed
 * 4. Appends a delivery-log row; counters update only on terminal outcomes
 *
 * With nothing due the worker sleeps until the next scheduled job (capped
 * at 30 s); enqueues wake it early. On startup any `processing` leftovers
 * are reset to `pending` with their attempt number preserved, which keeps
 * the at-least-once guarantee across crashes.
 */

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use forgehook_common::backoff::fixed_delay;
use forgehook_common::{Result, now_ms};
use forgehook_config::DeliveryConfig;
use forgehook_domain::job::{JobStatus, QueueJob, QueueStatus};
use forgehook_domain::log::{LogStatus, NewDeliveryLog};
use forgehook_domain::webhook::Webhook;

use crate::client::{DeliveryClient, DeliveryResult};
use crate::metrics;
use crate::notifier::{Notifier, WorkflowMessage};
use crate::store::SubscriptionStore;

/// Max jobs picked per tick.
const TICK_BATCH: i64 = 10;

/// Longest idle sleep between passes.
const MAX_IDLE_SLEEP: Duration = Duration::from_secs(30);

/// Delay applied when a job hits an infrastructure error (not a delivery
/// failure) so it does not spin.
const INFRA_ERROR_DELAY_MS: i64 = 5_000;

/// Owner-scoped view of the durable job table.
///
/// Constructed per shard; every statement is bounded by `owner_id`, so no
/// shard can observe another shard's jobs.
#[derive(Clone)]
pub struct ShardQueue {
    pool: SqlitePool,
    owner_id: String,
}

impl ShardQueue {
    pub fn new(pool: SqlitePool, owner_id: impl Into<String>) -> Self {
        Self { pool, owner_id: owner_id.into() }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Insert a pending job for immediate pickup.
    pub async fn insert_job(
        &self,
        webhook_id: Uuid,
        event_type: &str,
        payload: &str,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO queue_jobs (id, webhook_id, owner_id, event_type, payload, \
             attempt_number, status, scheduled_at, created_at) \
             VALUES (?, ?, ?, ?, ?, 1, 'pending', ?, ?)",
        )
        .bind(id)
        .bind(webhook_id)
        .bind(&self.owner_id)
        .bind(event_type)
        .bind(payload)
        .bind(now_ms())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        metrics::JOBS_ENQUEUED_TOTAL.with_label_values(&[event_type]).inc();

        debug!("Enqueued job {} for webhook {} ({})", id, webhook_id, event_type);
        Ok(id)
    }

    /// Due jobs, oldest schedule first.
    pub async fn due_jobs(&self, now: i64, limit: i64) -> Result<Vec<QueueJob>> {
        let jobs: Vec<QueueJob> = sqlx::query_as(
            "SELECT * FROM queue_jobs \
             WHERE owner_id = ? AND status = 'pending' AND scheduled_at <= ? \
             ORDER BY scheduled_at ASC LIMIT ?",
        )
        .bind(&self.owner_id)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    /// Earliest future schedule among pending jobs, if any.
    pub async fn next_scheduled(&self) -> Result<Option<i64>> {
        let row: (Option<i64>,) = sqlx::query_as(
            "SELECT MIN(scheduled_at) FROM queue_jobs WHERE owner_id = ? AND status = 'pending'",
        )
        .bind(&self.owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    pub async fn mark_processing(&self, job_id: Uuid, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE queue_jobs SET status = 'processing', last_attempt_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Put a failed-but-retryable job back in line with a bumped attempt
    /// number and a future schedule.
    pub async fn reschedule(
        &self,
        job_id: Uuid,
        next_attempt: i32,
        scheduled_at: i64,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE queue_jobs SET status = 'pending', attempt_number = ?, scheduled_at = ?, \
             last_error = ? WHERE id = ?",
        )
        .bind(next_attempt)
        .bind(scheduled_at)
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Move a job to a terminal status.
    pub async fn mark_terminal(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<()> {
        debug_assert!(status.is_terminal());
        sqlx::query("UPDATE queue_jobs SET status = ?, last_error = ? WHERE id = ?")
            .bind(status)
            .bind(error)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Crash recovery: anything stuck in `processing` returns to `pending`
    /// with its attempt number preserved and runs now.
    pub async fn reset_processing(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE queue_jobs SET status = 'pending', scheduled_at = ? \
             WHERE owner_id = ? AND status = 'processing'",
        )
        .bind(now_ms())
        .bind(&self.owner_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(
                "Shard {}: reset {} in-flight jobs to pending",
                self.owner_id,
                result.rows_affected()
            );
        }
        Ok(result.rows_affected())
    }

    /// Administrative: every failed job gets a fresh run from attempt 1.
    pub async fn retry_all_failed(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE queue_jobs SET status = 'pending', attempt_number = 1, scheduled_at = ?, \
             last_error = NULL WHERE owner_id = ? AND status = 'failed'",
        )
        .bind(now_ms())
        .bind(&self.owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Per-status counts for this owner's queue.
    pub async fn status(&self) -> Result<QueueStatus> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM queue_jobs WHERE owner_id = ? GROUP BY status",
        )
        .bind(&self.owner_id)
        .fetch_all(&self.pool)
        .await?;

        let mut status = QueueStatus::default();
        for (name, count) in rows {
            match name.as_str() {
                "pending" => status.pending = count,
                "processing" => status.processing = count,
                "success" => status.succeeded = count,
                "failed" => status.failed = count,
                other => warn!("Unknown job status in queue table: {other}"),
            }
        }
        Ok(status)
    }

    /// Remove terminal jobs older than `max_age_ms`.
    pub async fn cleanup(&self, max_age_ms: i64) -> Result<u64> {
        let cutoff = Utc::now() - ChronoDuration::milliseconds(max_age_ms);

        let result = sqlx::query(
            "DELETE FROM queue_jobs WHERE owner_id = ? \
             AND status IN ('success', 'failed') AND created_at < ?",
        )
        .bind(&self.owner_id)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Recent jobs for the admin execution-history view, newest first.
    pub async fn recent_jobs(&self, limit: i64, offset: i64) -> Result<Vec<QueueJob>> {
        let jobs: Vec<QueueJob> = sqlx::query_as(
            "SELECT * FROM queue_jobs WHERE owner_id = ? \
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(&self.owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }
}

/// One owner's worker: drains the shard queue serially.
struct QueueShard {
    queue: ShardQueue,
    store: SubscriptionStore,
    client: Arc<DeliveryClient>,
    notifier: Notifier,
    config: DeliveryConfig,
    wake: Arc<Notify>,
}

impl QueueShard {
    /// Worker loop. Runs until the shutdown signal fires; the in-flight
    /// delivery always completes before exit.
    async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let owner = self.queue.owner_id().to_string();

        if let Err(e) = self.queue.reset_processing().await {
            error!("Shard {owner}: recovery failed: {e}");
        }

        debug!("Shard {owner}: worker started");

        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            let now = now_ms();
            let jobs = match self.queue.due_jobs(now, TICK_BATCH).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!("Shard {owner}: failed to read due jobs: {e}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            if jobs.is_empty() {
                let sleep_for = match self.queue.next_scheduled().await {
                    Ok(Some(at)) if at > now => {
                        Duration::from_millis((at - now) as u64).min(MAX_IDLE_SLEEP)
                    }
                    Ok(Some(_)) => continue, // became due while we looked
                    _ => MAX_IDLE_SLEEP,
                };

                tokio::select! {
                    _ = self.wake.notified() => {}
                    _ = tokio::time::sleep(sleep_for) => {}
                    _ = shutdown_rx.recv() => break,
                }
                continue;
            }

            for job in jobs {
                let (job_id, attempt) = (job.id, job.attempt_number);
                if let Err(e) = self.process_one(job).await {
                    // Infrastructure error, not a delivery failure: the job
                    // goes back to pending (attempt preserved) after a
                    // bounded delay so the worker does not spin on it.
                    error!("Shard {owner}: job {job_id} hit an internal error: {e}");
                    let _ = self
                        .queue
                        .reschedule(
                            job_id,
                            attempt,
                            now_ms() + INFRA_ERROR_DELAY_MS,
                            Some("internal error, will re-run"),
                        )
                        .await;
                }
                if shutdown_rx.try_recv().is_ok() {
                    debug!("Shard {owner}: shutdown between jobs");
                    return;
                }
            }
        }

        debug!("Shard {owner}: worker stopped");
    }

    /// One attempt for one job: mark processing, deliver, finalize.
    async fn process_one(&self, job: QueueJob) -> Result<()> {
        let now = now_ms();
        self.queue.mark_processing(job.id, now).await?;

        // The live row is authoritative for url/secret/headers; the job only
        // freezes the payload.
        let webhook = match self.store.by_id(job.webhook_id).await? {
            Some(w) => w,
            None => {
                warn!("Job {} references a deleted webhook; dropping", job.id);
                self.queue
                    .mark_terminal(job.id, JobStatus::Failed, Some("webhook no longer exists"))
                    .await?;
                return Ok(());
            }
        };

        let result = self
            .client
            .deliver(
                &webhook.url,
                job.payload.as_bytes(),
                &webhook.secret,
                &job.event_type,
                webhook.timeout_ms,
                &webhook.custom_headers,
            )
            .await;

        metrics::DELIVERY_ATTEMPTS_TOTAL
            .with_label_values(&[&webhook.id.to_string(), &result.success.to_string()])
            .inc();
        metrics::DELIVERY_DURATION
            .with_label_values(&[&webhook.id.to_string()])
            .observe(result.duration_ms as f64 / 1000.0);
        if let Some(status) = result.status_code {
            metrics::HTTP_RESPONSES_TOTAL
                .with_label_values(&[&status.to_string()])
                .inc();
        }

        self.finalize(&job, &webhook, result).await
    }

    /// Settle one attempt: terminal success, scheduled retry, or terminal
    /// failure. Counters move only on terminal outcomes; every attempt gets
    /// a log row.
    async fn finalize(&self, job: &QueueJob, webhook: &Webhook, result: DeliveryResult) -> Result<()> {
        let mut log = NewDeliveryLog {
            webhook_id: webhook.id,
            event_type: job.event_type.clone(),
            url: webhook.url.clone(),
            attempt_number: job.attempt_number,
            status: LogStatus::Failed,
            http_status: result.status_code.map(i32::from),
            response_body: result.response_body.clone(),
            duration_ms: result.duration_ms as i64,
            error_message: result.error_message.clone(),
            payload: job.payload.clone(),
            delivered_at: None,
            next_retry_at: None,
        };

        if result.success {
            self.queue.mark_terminal(job.id, JobStatus::Success, None).await?;

            log.status = LogStatus::Success;
            log.delivered_at = Some(Utc::now());
            self.store.append_log(log).await?;
            self.store.record_attempt(webhook.id, true, result.duration_ms).await?;

            info!(
                "Delivered: webhook={} event={} attempt={}",
                webhook.id, job.event_type, job.attempt_number
            );

            self.notifier.notify(
                &job.owner_id,
                WorkflowMessage::ExecutionComplete {
                    job_id: job.id,
                    webhook_id: webhook.id,
                    success: true,
                    attempts: job.attempt_number,
                    timestamp: now_ms(),
                },
            );
            return Ok(());
        }

        let error_text = result
            .error_message
            .clone()
            .or_else(|| result.status_code.map(|c| format!("HTTP {c}")))
            .unwrap_or_else(|| "delivery failed".to_string());

        let retries_remain = job.attempt_number < webhook.max_retries;
        if result.should_retry && retries_remain && webhook.retry_enabled {
            let delay = fixed_delay(job.attempt_number as u32, &self.config.retry_delays_ms);
            let next_at = now_ms() + delay.as_millis() as i64;

            self.queue
                .reschedule(job.id, job.attempt_number + 1, next_at, Some(&error_text))
                .await?;

            log.status = LogStatus::Retrying;
            log.next_retry_at = Some(next_at);
            self.store.append_log(log).await?;

            metrics::RETRY_ATTEMPTS_TOTAL
                .with_label_values(&[&webhook.id.to_string()])
                .inc();

            warn!(
                "Retrying in {:?}: webhook={} event={} attempt={}/{}",
                delay, webhook.id, job.event_type, job.attempt_number, webhook.max_retries
            );

            self.notifier.notify(
                &job.owner_id,
                WorkflowMessage::ExecutionUpdate {
                    job_id: job.id,
                    webhook_id: webhook.id,
                    attempt_number: job.attempt_number,
                    status: "retrying".to_string(),
                    next_retry_at: Some(next_at),
                    timestamp: now_ms(),
                },
            );
        } else {
            self.queue
                .mark_terminal(job.id, JobStatus::Failed, Some(&error_text))
                .await?;

            log.status = LogStatus::Failed;
            self.store.append_log(log).await?;
            self.store.record_attempt(webhook.id, false, result.duration_ms).await?;

            error!(
                "Failed permanently: webhook={} event={} attempts={} error={}",
                webhook.id, job.event_type, job.attempt_number, error_text
            );

            self.notifier.notify(
                &job.owner_id,
                WorkflowMessage::ExecutionComplete {
                    job_id: job.id,
                    webhook_id: webhook.id,
                    success: false,
                    attempts: job.attempt_number,
                    timestamp: now_ms(),
                },
            );
        }

        Ok(())
    }
}

struct ShardHandle {
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

/// Spawns and wakes per-owner shards; routes enqueues to the right one.
pub struct ShardManager {
    pool: SqlitePool,
    store: SubscriptionStore,
    client: Arc<DeliveryClient>,
    notifier: Notifier,
    config: DeliveryConfig,
    shards: Mutex<HashMap<String, ShardHandle>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ShardManager {
    pub fn new(
        pool: SqlitePool,
        store: SubscriptionStore,
        client: Arc<DeliveryClient>,
        notifier: Notifier,
        config: DeliveryConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            pool,
            store,
            client,
            notifier,
            config,
            shards: Mutex::new(HashMap::new()),
            shutdown_tx,
        }
    }

    /// Owner-scoped queue view, for admin reads and sweeps.
    pub fn queue_for(&self, owner_id: &str) -> ShardQueue {
        ShardQueue::new(self.pool.clone(), owner_id)
    }

    /// Insert a job on the owner's shard and wake its worker.
    pub async fn enqueue(&self, webhook: &Webhook, event_type: &str, payload: &str) -> Result<Uuid> {
        let queue = self.queue_for(&webhook.owner_id);
        let job_id = queue.insert_job(webhook.id, event_type, payload).await?;
        self.wake_shard(&webhook.owner_id).await;
        Ok(job_id)
    }

    /// Ensure the owner's worker exists, then wake it.
    pub async fn wake_shard(&self, owner_id: &str) {
        let mut shards = self.shards.lock().await;

        let needs_spawn = match shards.get(owner_id) {
            Some(handle) => handle.task.is_finished(),
            None => true,
        };

        if needs_spawn {
            let wake = Arc::new(Notify::new());
            let shard = QueueShard {
                queue: self.queue_for(owner_id),
                store: self.store.clone(),
                client: Arc::clone(&self.client),
                notifier: self.notifier.clone(),
                config: self.config.clone(),
                wake: Arc::clone(&wake),
            };
            let shutdown_rx = self.shutdown_tx.subscribe();
            let task = tokio::spawn(shard.run(shutdown_rx));

            shards.insert(owner_id.to_string(), ShardHandle { wake, task });
        }

        if let Some(handle) = shards.get(owner_id) {
            handle.wake.notify_one();
        }
    }

    /// Retention sweep across all owners' terminal jobs.
    pub async fn cleanup_terminal_jobs(&self, max_age_ms: i64) -> Result<u64> {
        let cutoff = Utc::now() - ChronoDuration::milliseconds(max_age_ms);

        let result = sqlx::query(
            "DELETE FROM queue_jobs WHERE status IN ('success', 'failed') AND created_at < ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!("Reclaimed {} terminal jobs", result.rows_affected());
        }
        Ok(result.rows_affected())
    }

    /// Signal all shards and wait for them to drain.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        let mut shards = self.shards.lock().await;
        let handles: Vec<(String, ShardHandle)> = shards.drain().collect();
        drop(shards);

        for (owner, handle) in handles {
            handle.wake.notify_one();
            if tokio::time::timeout(Duration::from_secs(10), handle.task)
                .await
                .is_err()
            {
                warn!("Shard {owner}: did not stop within 10s");
            }
        }

        info!("All shards stopped");
    }
}
