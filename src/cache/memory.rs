//! In-memory cache store with optional file persistence.

use dashmap::DashMap;
use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tokio::time;

use crate::cache::CacheStore;
use crate::index::{IndexError, IndexResult};

fn snapshot_error(path: &str, err: impl std::fmt::Display) -> IndexError {
    IndexError::CacheUnavailable(format!("snapshot {path}: {err}"))
}

/// A cached value with its expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    /// Expiry timestamp (milliseconds since epoch).
    pub expires_at_ms: u64,
}

impl CacheEntry {
    /// Check if the entry is still fresh.
    pub fn is_fresh(&self) -> bool {
        self.expires_at_ms > now_ms()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Grace period applied when none is configured.
pub const DEFAULT_STALE_GRACE: Duration = Duration::from_secs(24 * 3600);

/// A thread-safe cache keeping expired entries around for stale reads.
///
/// Entries expired for longer than the stale grace are evicted by
/// `run_evictor` and never written to a snapshot.
#[derive(Clone)]
pub struct MemoryCacheStore {
    inner: Arc<DashMap<String, CacheEntry>>,
    persistence_path: Option<String>,
    stale_grace: Duration,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MemoryCacheStore {
    /// Create a new empty store.
    pub fn new(persistence_path: Option<String>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            persistence_path,
            stale_grace: DEFAULT_STALE_GRACE,
        }
    }

    pub fn with_stale_grace(mut self, grace: Duration) -> Self {
        self.stale_grace = grace;
        self
    }

    /// Load from file if it exists, dropping entries already past the grace.
    pub fn load_from_file(path: &str, stale_grace: Duration) -> IndexResult<Self> {
        let store = Self::new(Some(path.to_string())).with_stale_grace(stale_grace);
        if Path::new(path).exists() {
            let reader = BufReader::new(File::open(path).map_err(|e| snapshot_error(path, e))?);
            let map: HashMap<String, CacheEntry> =
                serde_json::from_reader(reader).map_err(|e| snapshot_error(path, e))?;
            for (k, v) in map {
                store.inner.insert(k, v);
            }
            let evicted = store.evict_expired(stale_grace);
            tracing::info!(entries = store.inner.len(), evicted, path, "Loaded cache snapshot");
        }
        Ok(store)
    }

    /// Save to file, if a persistence path was configured.
    pub fn save_to_file(&self) -> IndexResult<()> {
        if let Some(path) = &self.persistence_path {
            self.evict_expired(self.stale_grace);
            let writer = BufWriter::new(File::create(path).map_err(|e| snapshot_error(path, e))?);
            let map: HashMap<_, _> = self
                .inner
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect();
            serde_json::to_writer(writer, &map).map_err(|e| snapshot_error(path, e))?;
            tracing::info!(entries = map.len(), path = %path, "Saved cache snapshot");
        }
        Ok(())
    }

    /// Evict past-grace entries on a fixed interval until shutdown.
    pub async fn run_evictor(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.evict_expired(self.stale_grace);
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining = self.len(), "Cache evicted stale entries");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cache evictor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub fn insert(&self, key: &str, value: Value, ttl: Duration) {
        let expires_at_ms = now_ms().saturating_add(ttl.as_millis() as u64);
        self.inner.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at_ms,
            },
        );
    }

    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.inner
            .get(key)
            .filter(|r| r.value().is_fresh())
            .map(|r| r.value().value.clone())
    }

    pub fn lookup_stale(&self, key: &str) -> Option<Value> {
        self.inner.get(key).map(|r| r.value().value.clone())
    }

    /// Drop entries that expired more than `grace` ago.
    pub fn evict_expired(&self, grace: Duration) -> usize {
        let cutoff = now_ms().saturating_sub(grace.as_millis() as u64);
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.expires_at_ms > cutoff);
        before - self.inner.len()
    }

    /// Count of (fresh, expired) entries.
    pub fn get_summary(&self) -> (usize, usize) {
        let mut fresh = 0;
        let mut expired = 0;
        for r in self.inner.iter() {
            if r.value().is_fresh() {
                fresh += 1;
            } else {
                expired += 1;
            }
        }
        (fresh, expired)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, IndexResult<Option<Value>>> {
        future::ready(Ok(self.lookup(key))).boxed()
    }

    fn get_stale<'a>(&'a self, key: &'a str) -> BoxFuture<'a, IndexResult<Option<Value>>> {
        future::ready(Ok(self.lookup_stale(key))).boxed()
    }

    fn set<'a>(&'a self, key: &'a str, value: Value, ttl: Duration) -> BoxFuture<'a, IndexResult<()>> {
        self.insert(key, value, ttl);
        future::ready(Ok(())).boxed()
    }

    fn clear(&self) -> BoxFuture<'_, IndexResult<()>> {
        self.inner.clear();
        future::ready(Ok(())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_and_stale_reads() {
        let store = MemoryCacheStore::new(None);
        assert!(store.lookup("k").is_none());

        store.insert("k", json!({ "v": 1 }), Duration::from_secs(60));
        assert_eq!(store.lookup("k"), Some(json!({ "v": 1 })));

        // Zero TTL is already expired but still available to stale reads.
        store.insert("k", json!({ "v": 2 }), Duration::ZERO);
        assert!(store.lookup("k").is_none());
        assert_eq!(store.lookup_stale("k"), Some(json!({ "v": 2 })));
        assert_eq!(store.get_summary(), (0, 1));
    }

    #[tokio::test]
    async fn test_store_trait_roundtrip_and_clear() {
        let store = MemoryCacheStore::new(None);
        store.set("a", json!(1), Duration::from_secs(60)).await.unwrap();
        store.set("b", json!(2), Duration::ZERO).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(json!(1)));
        assert_eq!(store.get("b").await.unwrap(), None);
        assert_eq!(store.get_stale("b").await.unwrap(), Some(json!(2)));

        store.clear().await.unwrap();
        assert!(store.is_empty());
        assert_eq!(store.get_stale("b").await.unwrap(), None);
    }

    #[test]
    fn test_evict_expired_keeps_grace() {
        let store = MemoryCacheStore::new(None);
        store.insert("fresh", json!(1), Duration::from_secs(60));
        store.insert("expired", json!(2), Duration::ZERO);

        assert_eq!(store.evict_expired(Duration::from_secs(3600)), 0);
        assert_eq!(store.evict_expired(Duration::ZERO), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_persistence() {
        let path = temp_snapshot();

        let store = MemoryCacheStore::new(Some(path.clone()));
        store.insert("slashes:0xabc", json!([1, 2]), Duration::from_secs(600));
        store.save_to_file().unwrap();

        let loaded = MemoryCacheStore::load_from_file(&path, DEFAULT_STALE_GRACE).unwrap();
        assert_eq!(loaded.lookup("slashes:0xabc"), Some(json!([1, 2])));

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_snapshot_skips_entries_past_grace() {
        let path = temp_snapshot();

        let store = MemoryCacheStore::new(Some(path.clone())).with_stale_grace(Duration::ZERO);
        store.insert("fresh", json!(1), Duration::from_secs(600));
        store.insert("expired", json!(2), Duration::ZERO);
        store.save_to_file().unwrap();
        assert_eq!(store.len(), 1);

        let loaded = MemoryCacheStore::load_from_file(&path, Duration::ZERO).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.lookup_stale("expired").is_none());

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_corrupt_snapshot_is_cache_unavailable() {
        let path = temp_snapshot();
        std::fs::write(&path, "not json").unwrap();

        let result = MemoryCacheStore::load_from_file(&path, DEFAULT_STALE_GRACE);
        assert!(matches!(result, Err(IndexError::CacheUnavailable(_))));

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[tokio::test]
    async fn test_evictor_drops_past_grace_and_keeps_stale_within() {
        let short = Arc::new(MemoryCacheStore::new(None).with_stale_grace(Duration::ZERO));
        let long = Arc::new(MemoryCacheStore::new(None));
        for store in [&short, &long] {
            store.insert("expired", json!("old"), Duration::ZERO);
            store.insert("fresh", json!("new"), Duration::from_secs(600));
        }

        let (tx, _) = broadcast::channel(1);
        let interval = Duration::from_millis(10);
        let short_task = tokio::spawn(short.clone().run_evictor(interval, tx.subscribe()));
        let long_task = tokio::spawn(long.clone().run_evictor(interval, tx.subscribe()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        short_task.await.unwrap();
        long_task.await.unwrap();

        assert!(short.lookup_stale("expired").is_none());
        assert_eq!(short.lookup("fresh"), Some(json!("new")));
        assert_eq!(long.lookup_stale("expired"), Some(json!("old")));
        assert_eq!(long.len(), 2);
    }

    fn temp_snapshot() -> String {
        std::env::temp_dir()
            .join(format!("gateway-cache-{}.json", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .to_string()
    }
}
