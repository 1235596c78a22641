//! Tick-driven dispatch of queued requests.
//!
//! # Responsibilities
//! - Drain the dedup queue on a fixed tick, up to the concurrency ceiling
//! - Skip draining entirely while the circuit breaker is open
//! - Race each call against the dispatch deadline
//! - Settle every dispatch: breaker, memo, callers, active slot
//!
//! # Design Decisions
//! - Settlement stages are isolated; a panic in breaker or memo bookkeeping is
//!   logged and never stops callers from being resolved
//! - The pending request and active slot are released in one critical section
//!   so a key is never both active and re-queued
//! - In-flight dispatch tasks are tracked so shutdown can abort them

use futures_util::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::SchedulerConfig;
use crate::index::{DedupKey, IndexError, IndexResult};
use crate::observability::metrics;
use crate::resilience::{with_deadline, CircuitBreaker};
use crate::scheduler::memo::ProcessedMemo;
use crate::scheduler::queue::{DedupQueue, QueueEntry};

/// Drains the dedup queue under a concurrency ceiling.
pub struct ConcurrencyScheduler {
    queue: Arc<DedupQueue>,
    memo: Arc<ProcessedMemo>,
    breaker: Arc<CircuitBreaker>,
    max_concurrent: usize,
    tick_interval: Duration,
    dispatch_timeout: Duration,
    in_flight: Mutex<HashMap<DedupKey, AbortHandle>>,
}

impl ConcurrencyScheduler {
    pub fn new(
        config: &SchedulerConfig,
        queue: Arc<DedupQueue>,
        memo: Arc<ProcessedMemo>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            queue,
            memo,
            breaker,
            max_concurrent: config.max_concurrent_requests,
            tick_interval: config.tick_interval(),
            dispatch_timeout: config.dispatch_timeout(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Run the tick loop until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            max_concurrent = self.max_concurrent,
            dispatch_timeout_ms = self.dispatch_timeout.as_millis() as u64,
            "Scheduler starting"
        );

        let mut ticker = time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Scheduler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One drain pass. Returns how many requests were dispatched.
    pub fn tick(self: &Arc<Self>) -> usize {
        if self.breaker.is_open() {
            let counts = self.queue.counts();
            tracing::debug!(queue_size = counts.queue_size, "Circuit open, skipping tick");
            return 0;
        }

        let batch = self.queue.take_ready(self.max_concurrent);
        if batch.is_empty() {
            return 0;
        }

        let dispatched = batch.len();
        {
            let mut in_flight = self.lock_in_flight();
            for entry in batch {
                let key = entry.key.clone();
                let this = Arc::clone(self);
                let handle = tokio::spawn(async move { this.dispatch(entry).await });
                in_flight.insert(key, handle.abort_handle());
            }
        }

        let counts = self.queue.counts();
        metrics::record_queue_depth(counts.queue_size, counts.active_count);
        tracing::debug!(
            dispatched,
            active = counts.active_count,
            queued = counts.queue_size,
            "Tick dispatched requests"
        );
        dispatched
    }

    async fn dispatch(self: Arc<Self>, entry: QueueEntry) {
        let QueueEntry {
            key,
            priority,
            enqueued_at,
            build,
            ..
        } = entry;

        tracing::debug!(
            dedup_key = %key,
            priority = priority.0,
            waited_ms = enqueued_at.elapsed().as_millis() as u64,
            "Dispatching request"
        );

        let started = Instant::now();
        let deadline = self.dispatch_timeout;
        let call = AssertUnwindSafe(async move { with_deadline(deadline, build()).await });
        let outcome = call.catch_unwind().await.unwrap_or_else(|_| {
            Err(IndexError::TransportFailure("index call panicked".to_string()))
        });
        let elapsed = started.elapsed();

        metrics::record_dispatch(&outcome, elapsed);
        match &outcome {
            Ok(_) => tracing::debug!(
                dedup_key = %key,
                elapsed_ms = elapsed.as_millis() as u64,
                "Request completed"
            ),
            Err(e) => tracing::warn!(
                dedup_key = %key,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "Request failed"
            ),
        }

        self.settle(&key, outcome);
    }

    fn settle(&self, key: &DedupKey, outcome: IndexResult<Value>) {
        isolated("circuit_breaker", key, || match &outcome {
            Ok(_) => self.breaker.record_success(),
            Err(e) if e.counts_toward_breaker() => self.breaker.record_failure(),
            Err(_) => {}
        });

        isolated("processed_memo", key, || {
            self.memo.insert(key.clone(), outcome.clone())
        });

        // Before the slot is freed, so a re-dispatch of this key keeps its handle.
        self.lock_in_flight().remove(key);

        match self.queue.finish(key) {
            Some(completer) => {
                // Every caller may have given up; nothing left to notify.
                let _ = completer.send(outcome);
            }
            None => tracing::debug!(dedup_key = %key, "No pending callers at settlement"),
        }

        let counts = self.queue.counts();
        metrics::record_queue_depth(counts.queue_size, counts.active_count);
    }

    /// Abort every dispatch still running. Used on shutdown.
    pub fn abort_in_flight(&self) -> usize {
        let mut in_flight = self.lock_in_flight();
        let aborted = in_flight.len();
        for (_, handle) in in_flight.drain() {
            handle.abort();
        }
        aborted
    }

    pub fn queue(&self) -> &DedupQueue {
        &self.queue
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<DedupKey, AbortHandle>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn isolated(stage: &'static str, key: &DedupKey, f: impl FnOnce()) {
    if std::panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(stage, dedup_key = %key, "Settlement stage panicked, continuing");
    }
}
