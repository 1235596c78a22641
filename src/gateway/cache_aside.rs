//! Cache-aside query path and gateway ownership.
//!
//! # Responsibilities
//! - Serve fresh cache hits without touching the queue
//! - Enqueue misses, decode the shared outcome and write it through
//! - Fall back to stale cache entries while the breaker is open
//! - Own the background loops and stop them on shutdown
//!
//! # Design Decisions
//! - Cache read failures degrade to misses; write failures are logged
//! - Only the first caller's descriptor builds; joiners' are dropped

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::CacheStore;
use crate::config::validation::ValidationError;
use crate::config::{GatewayConfig, HistoricalWindowConfig};
use crate::gateway::types::QueueStatus;
use crate::history::{HistoricalWindow, WindowSnapshot};
use crate::index::{decode_record, IndexError, IndexQuery, IndexRecord, IndexResult, QueryExecutor};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::CircuitBreaker;
use crate::scheduler::{ConcurrencyScheduler, DedupQueue, Priority, ProcessedMemo, QueryDescriptor};

/// Cache-aside access to the index with coalescing, a concurrency ceiling,
/// a circuit breaker and stale-read fallback.
pub struct CacheAsideGateway {
    executor: Arc<dyn QueryExecutor>,
    cache: Arc<dyn CacheStore>,
    queue: Arc<DedupQueue>,
    memo: Arc<ProcessedMemo>,
    breaker: Arc<CircuitBreaker>,
    scheduler: Arc<ConcurrencyScheduler>,
    history: HistoricalWindow,
    default_ttl: Duration,
    memo_sweep_interval: Duration,
    shutdown: Shutdown,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheAsideGateway {
    /// Build the gateway without starting its background loops.
    pub fn new(
        config: &GatewayConfig,
        executor: Arc<dyn QueryExecutor>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        let memo = Arc::new(ProcessedMemo::new(config.scheduler.memo_ttl()));
        let queue = Arc::new(DedupQueue::new(memo.clone()));
        let breaker = Arc::new(CircuitBreaker::from_config(&config.circuit_breaker));
        let scheduler = Arc::new(ConcurrencyScheduler::new(
            &config.scheduler,
            queue.clone(),
            memo.clone(),
            breaker.clone(),
        ));

        Self {
            executor,
            cache,
            queue,
            memo,
            breaker,
            scheduler,
            history: HistoricalWindow::new(config.historical),
            default_ttl: config.cache.default_ttl(),
            memo_sweep_interval: config.scheduler.memo_sweep_interval(),
            shutdown: Shutdown::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Build the gateway and spawn the scheduler tick and memo sweep.
    pub fn start(
        config: &GatewayConfig,
        executor: Arc<dyn QueryExecutor>,
        cache: Arc<dyn CacheStore>,
    ) -> Arc<Self> {
        let gateway = Arc::new(Self::new(config, executor, cache));

        let scheduler = tokio::spawn(gateway.scheduler.clone().run(gateway.shutdown.subscribe()));
        let sweeper = tokio::spawn(
            gateway
                .memo
                .clone()
                .run_sweeper(gateway.memo_sweep_interval, gateway.shutdown.subscribe()),
        );
        gateway
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([scheduler, sweeper]);

        tracing::info!(
            historical_timestamp = %gateway.history.timestamp(),
            default_ttl_secs = gateway.default_ttl.as_secs(),
            "Gateway started"
        );
        gateway
    }

    /// Spawn a background loop that lives as long as the gateway.
    ///
    /// The loop gets a shutdown receiver and is awaited by `shutdown()`.
    pub fn spawn_owned<F, Fut>(&self, task: F)
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.shutdown.subscribe()));
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// Read `cache_key` through the cache, falling back to the index.
    ///
    /// On a miss the descriptor is enqueued; concurrent callers with the
    /// same dedup key share one execution. A successful result is written
    /// back with `ttl` before returning. If the call fails while the circuit
    /// breaker is open, a stale cached value is returned when one exists.
    pub async fn query<T: IndexRecord>(
        &self,
        cache_key: &str,
        descriptor: QueryDescriptor,
        ttl: Duration,
    ) -> IndexResult<T> {
        let request_id = Uuid::new_v4();
        let span = tracing::debug_span!(
            "gateway_query",
            %request_id,
            cache_key,
            dedup_key = %descriptor.dedup_key(),
        );
        self.query_inner(cache_key, descriptor, ttl).instrument(span).await
    }

    /// `query` for a plain index query run by the gateway's executor.
    pub async fn query_index<T: IndexRecord>(
        &self,
        cache_key: &str,
        query: IndexQuery,
        priority: Priority,
        ttl: Duration,
    ) -> IndexResult<T> {
        self.query(cache_key, self.descriptor(query, priority), ttl).await
    }

    async fn query_inner<T: IndexRecord>(
        &self,
        cache_key: &str,
        descriptor: QueryDescriptor,
        ttl: Duration,
    ) -> IndexResult<T> {
        if self.shutdown.is_triggered() {
            return Err(IndexError::Shutdown);
        }

        if let Some(record) = self.read_fresh::<T>(cache_key).await {
            return Ok(record);
        }

        let descriptor = if ttl.is_zero() {
            descriptor
        } else {
            descriptor.reuse_within(ttl)
        };

        let outcome = self
            .queue
            .enqueue(descriptor)
            .await
            .and_then(|value| decode_record::<T>(value.clone()).map(|record| (record, value)));

        match outcome {
            Ok((record, value)) => {
                if let Err(e) = self.cache.set(cache_key, value, ttl).await {
                    tracing::warn!(error = %e, "Cache write-through failed");
                }
                Ok(record)
            }
            Err(error) => self.fallback(cache_key, error).await,
        }
    }

    async fn read_fresh<T: IndexRecord>(&self, cache_key: &str) -> Option<T> {
        match self.cache.get(cache_key).await {
            Ok(Some(value)) => match decode_record::<T>(value) {
                Ok(record) => {
                    metrics::record_cache_lookup("hit");
                    tracing::debug!("Cache hit");
                    Some(record)
                }
                Err(e) => {
                    metrics::record_cache_lookup("miss");
                    tracing::warn!(error = %e, "Cached value failed to decode, treating as miss");
                    None
                }
            },
            Ok(None) => {
                metrics::record_cache_lookup("miss");
                None
            }
            Err(e) => {
                metrics::record_cache_lookup("error");
                tracing::warn!(error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn fallback<T: IndexRecord>(&self, cache_key: &str, error: IndexError) -> IndexResult<T> {
        if !self.breaker.is_open() {
            return Err(error);
        }

        match self.cache.get_stale(cache_key).await {
            Ok(Some(value)) => match decode_record::<T>(value) {
                Ok(record) => {
                    metrics::record_stale_fallback();
                    tracing::warn!(error = %error, "Circuit open, serving stale cached value");
                    Ok(record)
                }
                Err(decode_error) => {
                    tracing::warn!(error = %decode_error, "Stale value failed to decode");
                    Err(error)
                }
            },
            Ok(None) => Err(error),
            Err(cache_error) => {
                tracing::warn!(error = %cache_error, "Stale cache read failed");
                Err(error)
            }
        }
    }

    /// Descriptor running `query` through the gateway's executor.
    pub fn descriptor(&self, query: IndexQuery, priority: Priority) -> QueryDescriptor {
        QueryDescriptor::for_query(query, priority, self.executor.clone())
    }

    pub fn queue_status(&self) -> QueueStatus {
        let counts = self.queue.counts();
        QueueStatus {
            queue_size: counts.queue_size,
            active_count: counts.active_count,
            failure_count: self.breaker.failure_count(),
            circuit_open: self.breaker.is_open(),
            pending_dedup_count: counts.pending_dedup_count,
        }
    }

    pub fn historical_config(&self) -> HistoricalWindowConfig {
        self.history.config()
    }

    /// Lower bound for time-bounded queries.
    pub fn historical_timestamp(&self) -> chrono::DateTime<chrono::Utc> {
        self.history.timestamp()
    }

    /// Swap in a new historical window. Queries already built keep their bound.
    pub fn update_historical_config(
        &self,
        config: HistoricalWindowConfig,
    ) -> Result<WindowSnapshot, ValidationError> {
        self.history.update(config)
    }

    pub async fn clear_cache(&self) -> IndexResult<()> {
        self.cache.clear().await?;
        tracing::info!("Cache cleared");
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn scheduler(&self) -> &Arc<ConcurrencyScheduler> {
        &self.scheduler
    }

    /// Stop background loops, abort in-flight calls and reject every
    /// queued or pending caller with `IndexError::Shutdown`.
    pub async fn shutdown(&self) {
        if !self.shutdown.trigger() {
            return;
        }
        tracing::info!("Gateway shutting down");

        let tasks: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task ended abnormally");
            }
        }

        let aborted = self.scheduler.abort_in_flight();
        let rejected = self.queue.close();
        tracing::info!(aborted, rejected, "Gateway stopped");
    }
}

impl std::fmt::Debug for CacheAsideGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAsideGateway")
            .field("status", &self.queue_status())
            .field("historical", &self.history.snapshot())
            .finish()
    }
}
