//! Cache store abstraction.
//!
//! # Responsibilities
//! - Define the key-value contract the gateway reads through and writes to
//! - Provide an in-process store (memory.rs) for single-instance deployments
//!
//! # Design Decisions
//! - Single-key operations only; no pattern deletes
//! - Stale reads are a separate operation so freshness rules are explicit
//! - Concurrent writers are last-write-wins; no transactions

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::time::Duration;

use crate::index::IndexResult;

pub mod memory;

pub use memory::MemoryCacheStore;

/// Key-value store with per-entry TTL.
///
/// Failures surface as `IndexError::CacheUnavailable`.
pub trait CacheStore: Send + Sync {
    /// Read a fresh (unexpired) entry.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, IndexResult<Option<Value>>>;

    /// Read an entry ignoring its TTL.
    ///
    /// Stores that evict on expiry can only answer with what they still hold.
    fn get_stale<'a>(&'a self, key: &'a str) -> BoxFuture<'a, IndexResult<Option<Value>>> {
        self.get(key)
    }

    fn set<'a>(&'a self, key: &'a str, value: Value, ttl: Duration) -> BoxFuture<'a, IndexResult<()>>;

    fn clear(&self) -> BoxFuture<'_, IndexResult<()>>;
}
