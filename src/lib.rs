//! Staking risk data gateway library.
//!
//! Resilient access to an external staking index: cache-aside reads,
//! request coalescing, a concurrency ceiling, a circuit breaker and
//! stale-read fallback.

// Core data path
pub mod cache;
pub mod gateway;
pub mod index;
pub mod scheduler;

// Domain
pub mod history;
pub mod staking;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use gateway::{CacheAsideGateway, QueueStatus};
pub use lifecycle::Shutdown;
