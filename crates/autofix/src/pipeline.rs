/*!
 * Auto-Fix Execution Pipeline
 *
 * A priority queue of classified errors drained by a bounded worker:
 * auto-fixable first, then severity, then confidence, FIFO within ties.
 * Each error gets up to `max_retries` attempts with the shared backoff
 * family (exponential mode by default). Successfully fixed hashes join a
 * TTL deduplication set so a re-observed error is suppressed while the fix
 * settles.
 */

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use forgehook_common::backoff::{exponential_delay, fixed_delay};
use forgehook_config::AutofixConfig;
use forgehook_domain::fix::ClassifiedError;

use crate::classifier::classify;

/// One fix implementation. The platform wires a dispatcher that routes on
/// `error.strategy` (fast-fixer vs deep-debugger); tests plug in fakes.
pub trait FixExecutor: Send + Sync + 'static {
    fn execute(
        &self,
        error: &ClassifiedError,
        attempt: u32,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// What `submit` did with a raw error.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Queued for repair.
    Queued(ClassifiedError),
    /// Not auto-fixable (manual strategy); surfaced, not queued.
    NotFixable(ClassifiedError),
    /// Same hash was fixed within the dedup window; ignored.
    Suppressed(String),
}

/// Heap entry: auto-fixable first, then severity, then confidence,
/// then FIFO by submission order.
struct QueuedFix {
    error: ClassifiedError,
    seq: u64,
}

impl PartialEq for QueuedFix {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for QueuedFix {}

impl PartialOrd for QueuedFix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedFix {
    fn cmp(&self, other: &Self) -> Ordering {
        self.error
            .auto_fixable
            .cmp(&other.error.auto_fixable)
            .then(self.error.severity.cmp(&other.error.severity))
            .then(
                self.error
                    .confidence
                    .partial_cmp(&other.error.confidence)
                    .unwrap_or(Ordering::Equal),
            )
            // BinaryHeap is a max-heap: lower seq must sort higher for FIFO
            .then(other.seq.cmp(&self.seq))
    }
}

/// Bounded auto-fix pipeline for one user session.
pub struct FixPipeline<E: FixExecutor> {
    executor: Arc<E>,
    config: AutofixConfig,
    queue: Mutex<BinaryHeap<QueuedFix>>,
    seq: Mutex<u64>,
    /// hash -> suppression deadline
    dedup: Mutex<HashMap<String, Instant>>,
    permits: Arc<Semaphore>,
    wake: Notify,
    cancel: CancellationToken,
}

impl<E: FixExecutor> FixPipeline<E> {
    pub fn new(executor: Arc<E>, config: AutofixConfig) -> Arc<Self> {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_fixes));
        Arc::new(Self {
            executor,
            config,
            queue: Mutex::new(BinaryHeap::new()),
            seq: Mutex::new(0),
            dedup: Mutex::new(HashMap::new()),
            permits,
            wake: Notify::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Classify a raw error and queue it for repair.
    pub fn submit(&self, raw_error: &str) -> SubmitOutcome {
        let classified = classify(raw_error);

        if self.is_suppressed(&classified.error_hash) {
            debug!("Suppressing recently-fixed error {}", classified.error_hash);
            return SubmitOutcome::Suppressed(classified.error_hash);
        }

        if !classified.auto_fixable {
            return SubmitOutcome::NotFixable(classified);
        }

        let seq = {
            let mut seq = self.seq.lock().expect("seq lock poisoned");
            *seq += 1;
            *seq
        };

        self.queue
            .lock()
            .expect("queue lock poisoned")
            .push(QueuedFix { error: classified.clone(), seq });
        self.wake.notify_one();

        SubmitOutcome::Queued(classified)
    }

    /// Worker loop: pops by priority, runs up to `max_concurrent_fixes`
    /// attempts in flight. Runs until `abort()`.
    pub async fn run(self: Arc<Self>) {
        info!(
            "Auto-fix pipeline started (concurrency {}, {} attempts per error)",
            self.config.max_concurrent_fixes, self.config.max_retries
        );

        loop {
            let next = self.pop_next();

            let Some(fix) = next else {
                tokio::select! {
                    _ = self.wake.notified() => continue,
                    _ = self.cancel.cancelled() => break,
                }
            };

            // Bound concurrency; the permit rides into the attempt task
            let permit = tokio::select! {
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
                _ = self.cancel.cancelled() => break,
            };

            let pipeline = Arc::clone(&self);
            tokio::spawn(async move {
                pipeline.attempt_with_retries(fix.error).await;
                drop(permit);
            });
        }

        info!("Auto-fix pipeline stopped");
    }

    /// One error's bounded retry loop.
    async fn attempt_with_retries(&self, error: ClassifiedError) {
        for attempt in 1..=self.config.max_retries {
            if self.cancel.is_cancelled() {
                return;
            }

            match self.executor.execute(&error, attempt).await {
                Ok(()) => {
                    info!(
                        "Fixed {:?} error on attempt {} (hash {})",
                        error.kind, attempt, error.error_hash
                    );
                    self.mark_fixed(&error.error_hash);
                    return;
                }
                Err(e) => {
                    warn!(
                        "Fix attempt {}/{} failed for {:?}: {e}",
                        attempt, self.config.max_retries, error.kind
                    );

                    if attempt == self.config.max_retries {
                        break;
                    }

                    let delay = self.backoff(attempt);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => return,
                    }
                }
            }
        }

        warn!(
            "Giving up on {:?} error after {} attempts (hash {})",
            error.kind, self.config.max_retries, error.error_hash
        );
    }

    fn backoff(&self, failed_attempt: u32) -> Duration {
        if self.config.exponential_backoff {
            exponential_delay(failed_attempt, self.config.base_delay_ms, self.config.max_delay_ms)
        } else {
            fixed_delay(
                failed_attempt,
                &forgehook_common::backoff::DEFAULT_RETRY_DELAYS_MS,
            )
        }
    }

    fn pop_next(&self) -> Option<QueuedFix> {
        self.queue.lock().expect("queue lock poisoned").pop()
    }

    fn is_suppressed(&self, hash: &str) -> bool {
        let mut dedup = self.dedup.lock().expect("dedup lock poisoned");
        match dedup.get(hash) {
            Some(deadline) if Instant::now() < *deadline => true,
            Some(_) => {
                dedup.remove(hash);
                false
            }
            None => false,
        }
    }

    fn mark_fixed(&self, hash: &str) {
        let deadline = Instant::now() + Duration::from_millis(self.config.dedup_window_ms);
        self.dedup
            .lock()
            .expect("dedup lock poisoned")
            .insert(hash.to_string(), deadline);
    }

    /// Drain the queue and cancel the worker context. In-flight attempts
    /// observe the cancellation at their next suspension point.
    pub fn abort(&self) {
        self.queue.lock().expect("queue lock poisoned").clear();
        self.cancel.cancel();
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().expect("queue lock poisoned").len()
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
