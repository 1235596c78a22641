//! Cache-aside gateway: the public entry point for index reads.
//!
//! # Data Flow
//! ```text
//! query(cache_key, descriptor, ttl)
//!     → CacheStore::get           hit → decode → return
//!     → DedupQueue::enqueue       (coalesce / memo reuse / queue)
//!     → ConcurrencyScheduler      (tick, breaker gate, deadline)
//!     → decode + validate record
//!     → CacheStore::set           (awaited, failure logged)
//!
//! on failure with the breaker open:
//!     → CacheStore::get_stale     hit → return stale value
//! ```
//!
//! # Design Decisions
//! - One owned instance holds every piece of mutable state; no statics
//! - Background loops are owned tasks stopped by `shutdown()`
//! - No retries here; a caller retries by calling `query` again

pub mod cache_aside;
pub mod types;

pub use cache_aside::CacheAsideGateway;
pub use types::QueueStatus;
