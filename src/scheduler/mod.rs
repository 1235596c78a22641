//! Request scheduling subsystem.
//!
//! # Data Flow
//! ```text
//! QueryDescriptor {dedup_key, priority, build}
//!     → queue.rs (join in-flight key, or queue by priority + arrival)
//!     → dispatcher.rs (tick: breaker closed? free slots? take ready entries)
//!     → build() raced against the dispatch deadline
//!     → settle: breaker → memo.rs → every coalesced caller → free slot
//! ```
//!
//! # Design Decisions
//! - All mutable bookkeeping lives in owned instances, shared via Arc
//! - The queue is unbounded; only active executions are capped
//! - No cross-key ordering beyond priority, then FIFO

pub mod descriptor;
pub mod dispatcher;
pub mod memo;
pub mod queue;

pub use descriptor::{Priority, QueryDescriptor};
pub use dispatcher::ConcurrencyScheduler;
pub use memo::ProcessedMemo;
pub use queue::{DedupQueue, QueueCounts, SharedOutcome};
