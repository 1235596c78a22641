//! Staking data source built on the cache-aside gateway.
//!
//! # Data Flow
//! ```text
//! participant
//!     → StakingDataSource (bound below by the historical timestamp)
//!     → CacheAsideGateway::query  (cache key kind:participant:since)
//!     → typed records (SlashingEvents, DelegationChanges, RewardHistory)
//! ```
//!
//! Risk scoring over these records lives with the callers.

pub mod source;
pub mod types;

pub use source::{StakingDataSource, StakingQuery};
pub use types::{
    DelegationChange, DelegationChanges, DelegationKind, RewardHistory, RewardSeries,
    SlashingEvent, SlashingEvents,
};
