//! Query descriptors: what the dedup queue runs.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::index::{DedupKey, IndexQuery, IndexResult, QueryExecutor};

/// Deferred index call. Invoked at most once, at dispatch time.
pub type BuildFn = Box<dyn FnOnce() -> BoxFuture<'static, IndexResult<Value>> + Send>;

/// Dispatch priority. Higher values are drained first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Priority(pub u8);

impl Priority {
    pub const LOW: Priority = Priority(0);
    pub const NORMAL: Priority = Priority(1);
    pub const HIGH: Priority = Priority(2);
    pub const CRITICAL: Priority = Priority(3);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

/// A request for the dedup queue: key, priority and the deferred call.
pub struct QueryDescriptor {
    dedup_key: DedupKey,
    priority: Priority,
    reuse_within: Option<Duration>,
    build: BuildFn,
}

impl QueryDescriptor {
    /// Wrap an arbitrary async call under an explicit key.
    pub fn new<F, Fut>(dedup_key: DedupKey, priority: Priority, build: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = IndexResult<Value>> + Send + 'static,
    {
        Self {
            dedup_key,
            priority,
            reuse_within: None,
            build: Box::new(move || build().boxed()),
        }
    }

    /// Describe an index query run through `executor`.
    pub fn for_query(query: IndexQuery, priority: Priority, executor: Arc<dyn QueryExecutor>) -> Self {
        let dedup_key = DedupKey::for_query(&query);
        Self {
            dedup_key,
            priority,
            reuse_within: None,
            build: Box::new(move || executor.execute(query)),
        }
    }

    /// Accept a memoized success younger than `window` instead of a new call.
    pub fn reuse_within(mut self, window: Duration) -> Self {
        self.reuse_within = Some(window);
        self
    }

    pub fn dedup_key(&self) -> &DedupKey {
        &self.dedup_key
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn into_parts(self) -> (DedupKey, Priority, Option<Duration>, BuildFn) {
        (self.dedup_key, self.priority, self.reuse_within, self.build)
    }
}

impl std::fmt::Debug for QueryDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryDescriptor")
            .field("dedup_key", &self.dedup_key)
            .field("priority", &self.priority)
            .field("reuse_within", &self.reuse_within)
            .finish()
    }
}
