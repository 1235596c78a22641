//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the index client from validated configuration
//! - Restore the cache snapshot when persistence is configured
//! - Start the gateway with its background loops, cache eviction included
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;
use thiserror::Error;

use crate::cache::MemoryCacheStore;
use crate::config::GatewayConfig;
use crate::gateway::CacheAsideGateway;
use crate::index::{IndexClient, IndexError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("index client: {0}")]
    Index(#[from] IndexError),

    #[error("cache snapshot: {0}")]
    CacheSnapshot(IndexError),
}

/// A running gateway and the store behind it.
pub struct Runtime {
    pub gateway: Arc<CacheAsideGateway>,
    pub cache: Arc<MemoryCacheStore>,
}

/// Wire config → index client → cache store → gateway.
///
/// Must be called inside a Tokio runtime.
pub fn build_gateway(config: &GatewayConfig) -> Result<Runtime, StartupError> {
    let client = Arc::new(IndexClient::new(&config.index)?);

    let grace = config.cache.stale_grace();
    let cache = match &config.cache.persistence_path {
        Some(path) => {
            MemoryCacheStore::load_from_file(path, grace).map_err(StartupError::CacheSnapshot)?
        }
        None => MemoryCacheStore::new(None).with_stale_grace(grace),
    };
    let cache = Arc::new(cache);

    tracing::info!(
        endpoint = %config.index.endpoint,
        max_concurrent = config.scheduler.max_concurrent_requests,
        failure_threshold = config.circuit_breaker.failure_threshold,
        cached_entries = cache.len(),
        "Subsystems initialized"
    );

    let gateway = CacheAsideGateway::start(config, client, cache.clone());
    let evictor = cache.clone();
    let interval = config.cache.eviction_interval();
    gateway.spawn_owned(move |shutdown| evictor.run_evictor(interval, shutdown));

    Ok(Runtime { gateway, cache })
}
