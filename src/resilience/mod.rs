//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch to index:
//!     → timeouts.rs (enforce dispatch deadline, cancel on expiry)
//!     → circuit_breaker.rs (track consecutive failures, gate the scheduler)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every index call has a deadline
//! - No automatic retries; callers retry by issuing a fresh query
//! - Circuit breaker prevents hammering a failing index

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::CircuitBreaker;
pub use timeouts::with_deadline;
