//! Request coalescing and the pending queue.
//!
//! # Responsibilities
//! - Hand every caller for a dedup key the same shared future
//! - Queue novel keys with their priority and arrival order
//! - Track which keys are executing (the active set)
//!
//! # Invariants
//! - At most one pending request per key
//! - A key is either queued or active, never both; moving between the two
//!   happens inside one critical section

use futures_util::future::{self, BoxFuture, Shared};
use futures_util::FutureExt;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::index::{DedupKey, IndexError, IndexResult};
use crate::observability::metrics;
use crate::scheduler::descriptor::{BuildFn, Priority, QueryDescriptor};
use crate::scheduler::memo::ProcessedMemo;

/// The future every coalesced caller awaits.
pub type SharedOutcome = Shared<BoxFuture<'static, IndexResult<Value>>>;

/// Settles a pending request.
pub type Completer = oneshot::Sender<IndexResult<Value>>;

/// A queued, not yet dispatched request.
pub struct QueueEntry {
    pub key: DedupKey,
    pub priority: Priority,
    pub enqueued_at: Instant,
    seq: u64,
    pub build: BuildFn,
}

struct PendingRequest {
    future: SharedOutcome,
    completer: Option<Completer>,
}

#[derive(Default)]
struct QueueState {
    entries: Vec<QueueEntry>,
    pending: HashMap<DedupKey, PendingRequest>,
    active: HashSet<DedupKey>,
    next_seq: u64,
    closed: bool,
}

/// Snapshot of queue bookkeeping sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCounts {
    pub queue_size: usize,
    pub active_count: usize,
    pub pending_dedup_count: usize,
}

/// Coalescing priority queue.
pub struct DedupQueue {
    state: Mutex<QueueState>,
    memo: Arc<ProcessedMemo>,
}

impl DedupQueue {
    pub fn new(memo: Arc<ProcessedMemo>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            memo,
        }
    }

    /// Join the in-flight request for this key, or queue a new one.
    pub fn enqueue(&self, descriptor: QueryDescriptor) -> SharedOutcome {
        let (key, priority, reuse_within, build) = descriptor.into_parts();
        let mut state = self.lock();

        if state.closed {
            return settled(Err(IndexError::Shutdown));
        }

        if let Some(pending) = state.pending.get(&key) {
            metrics::record_dedup_join();
            tracing::debug!(dedup_key = %key, "Joined in-flight request");
            return pending.future.clone();
        }

        if let Some(window) = reuse_within {
            if let Some(value) = self.memo.reusable(&key, window) {
                tracing::debug!(dedup_key = %key, "Served from processed memo");
                return settled(Ok(value));
            }
        }

        let (tx, rx) = oneshot::channel();
        // A dropped completer means the gateway went away mid-flight.
        let future = rx
            .map(|received| received.unwrap_or(Err(IndexError::Shutdown)))
            .boxed()
            .shared();

        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.push(QueueEntry {
            key: key.clone(),
            priority,
            enqueued_at: Instant::now(),
            seq,
            build,
        });
        state.pending.insert(
            key.clone(),
            PendingRequest {
                future: future.clone(),
                completer: Some(tx),
            },
        );

        tracing::debug!(
            dedup_key = %key,
            priority = priority.0,
            queue_size = state.entries.len(),
            "Request queued"
        );
        future
    }

    /// Move up to `max_concurrent - active` entries into the active set.
    ///
    /// Entries come out by priority (highest first), then arrival order.
    pub fn take_ready(&self, max_concurrent: usize) -> Vec<QueueEntry> {
        let mut state = self.lock();
        let available = max_concurrent.saturating_sub(state.active.len());
        if available == 0 || state.entries.is_empty() {
            return Vec::new();
        }

        state.entries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.enqueued_at.cmp(&b.enqueued_at))
                .then(a.seq.cmp(&b.seq))
        });

        let take = available.min(state.entries.len());
        let batch: Vec<QueueEntry> = state.entries.drain(..take).collect();
        for entry in &batch {
            state.active.insert(entry.key.clone());
        }
        batch
    }

    /// Drop the pending request and active slot for `key`.
    ///
    /// Returns the completer so the caller can settle the shared future
    /// outside the lock.
    pub fn finish(&self, key: &DedupKey) -> Option<Completer> {
        let mut state = self.lock();
        let completer = state
            .pending
            .remove(key)
            .and_then(|mut pending| pending.completer.take());
        if !state.active.remove(key) {
            tracing::warn!(dedup_key = %key, "Finished key was not in the active set");
        }
        completer
    }

    /// Reject everything queued or pending and refuse new work.
    pub fn close(&self) -> usize {
        let completers: Vec<Completer> = {
            let mut state = self.lock();
            state.closed = true;
            state.entries.clear();
            state.active.clear();
            state
                .pending
                .drain()
                .filter_map(|(_, mut pending)| pending.completer.take())
                .collect()
        };

        let rejected = completers.len();
        for completer in completers {
            let _ = completer.send(Err(IndexError::Shutdown));
        }
        rejected
    }

    pub fn counts(&self) -> QueueCounts {
        let state = self.lock();
        QueueCounts {
            queue_size: state.entries.len(),
            active_count: state.active.len(),
            pending_dedup_count: state.pending.len(),
        }
    }

    pub fn is_active(&self, key: &DedupKey) -> bool {
        self.lock().active.contains(key)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            tracing::warn!("Queue state lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

fn settled(outcome: IndexResult<Value>) -> SharedOutcome {
    future::ready(outcome).boxed().shared()
}
