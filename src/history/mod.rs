//! Historical lower bound for time-bounded index queries.
//!
//! # Responsibilities
//! - Derive `now - (years + months + days)` from a reconfigurable offset
//! - Publish the derived bound so readers never see a half-applied update
//!
//! # Design Decisions
//! - Derivation is a pure function of (now, offset) for testability
//! - The offset and its bound are swapped together as one snapshot

pub mod window;

pub use window::{derive_lower_bound, HistoricalWindow, WindowSnapshot};
