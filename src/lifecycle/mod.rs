//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build client + cache → Start gateway loops
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop loops → Abort in-flight → Reject waiters → Persist cache
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then client and cache, then loops
//! - Callers still waiting at shutdown get an error, never a hang

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{wait_for_signal, ShutdownSignal};
pub use startup::{build_gateway, Runtime, StartupError};
