//! Short-lived record of completed dispatches.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::index::{DedupKey, IndexResult};

/// Outcome of one completed dispatch.
#[derive(Debug, Clone)]
pub struct MemoEntry {
    pub outcome: IndexResult<Value>,
    pub completed_at: Instant,
}

/// Completed outcomes keyed by dedup key, swept by age.
#[derive(Debug)]
pub struct ProcessedMemo {
    entries: Mutex<HashMap<DedupKey, MemoEntry>>,
    ttl: Duration,
    #[cfg(test)]
    fail_inserts: std::sync::atomic::AtomicBool,
}

impl ProcessedMemo {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            #[cfg(test)]
            fail_inserts: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Make every later `insert` panic.
    #[cfg(test)]
    pub(crate) fn fail_inserts(&self) {
        self.fail_inserts
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn insert(&self, key: DedupKey, outcome: IndexResult<Value>) {
        #[cfg(test)]
        if self.fail_inserts.load(std::sync::atomic::Ordering::SeqCst) {
            panic!("memo insert failed for {key}");
        }
        self.lock().insert(
            key,
            MemoEntry {
                outcome,
                completed_at: Instant::now(),
            },
        );
    }

    /// A successful outcome no older than `max_age` (capped by the memo ttl).
    pub fn reusable(&self, key: &DedupKey, max_age: Duration) -> Option<Value> {
        let max_age = max_age.min(self.ttl);
        let entries = self.lock();
        let entry = entries.get(key)?;
        if entry.completed_at.elapsed() > max_age {
            return None;
        }
        entry.outcome.as_ref().ok().cloned()
    }

    pub fn get(&self, key: &DedupKey) -> Option<MemoEntry> {
        self.lock().get(key).cloned()
    }

    /// Drop entries older than the ttl. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.completed_at.elapsed() <= self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep on a fixed interval until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Processed memo swept");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Memo sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DedupKey, MemoEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
