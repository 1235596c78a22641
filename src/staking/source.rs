//! Staking queries bounded by the historical window.
//!
//! # Responsibilities
//! - Build slashing, delegation and reward queries for one participant
//! - Key each result as `kind:participant:since` in the cache
//!
//! # Design Decisions
//! - `since` is read once per call so cache key and filter always agree
//! - Each query kind carries its own scheduler priority

use alloy::primitives::Address;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::gateway::CacheAsideGateway;
use crate::index::{IndexQuery, IndexRecord, IndexResult};
use crate::scheduler::Priority;
use crate::staking::types::{DelegationChanges, RewardHistory, SlashingEvents};

const SLASHING_QUERY: &str = r#"
query SlashEvents($participant: String!, $since: BigInt!) {
  slashEvents(where: { participant: $participant, timestamp_gte: $since }, orderBy: timestamp) {
    id
    participant
    amount
    timestamp
  }
}"#;

const DELEGATION_QUERY: &str = r#"
query DelegationChanges($participant: String!, $since: BigInt!) {
  delegationChanges(where: { operator: $participant, timestamp_gte: $since }, orderBy: timestamp) {
    id
    delegator
    kind
    amount
    timestamp
  }
}"#;

const REWARD_QUERY: &str = r#"
query RewardSeries($participant: String!, $since: BigInt!) {
  rewardSeries(participant: $participant, since: $since) {
    timestamps
    amounts
  }
}"#;

/// The staking queries this source knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StakingQuery {
    Slashing,
    Delegations,
    Rewards,
}

impl StakingQuery {
    pub fn as_str(&self) -> &'static str {
        match self {
            StakingQuery::Slashing => "slashing",
            StakingQuery::Delegations => "delegations",
            StakingQuery::Rewards => "rewards",
        }
    }

    /// Slashing feeds the most time-sensitive risk signal, rewards the least.
    pub fn priority(&self) -> Priority {
        match self {
            StakingQuery::Slashing => Priority::HIGH,
            StakingQuery::Delegations => Priority::NORMAL,
            StakingQuery::Rewards => Priority::LOW,
        }
    }

    fn text(&self) -> &'static str {
        match self {
            StakingQuery::Slashing => SLASHING_QUERY,
            StakingQuery::Delegations => DELEGATION_QUERY,
            StakingQuery::Rewards => REWARD_QUERY,
        }
    }

    /// Index query for `participant` bounded below by `since` (unix seconds).
    pub fn build(&self, participant: Address, since: i64) -> IndexQuery {
        IndexQuery::new(
            self.text(),
            json!({
                "participant": participant_id(participant),
                "since": since.to_string(),
            }),
        )
    }

    /// Cache key of the form `kind:participant:since`.
    pub fn cache_key(&self, participant: Address, since: i64) -> String {
        format!("{}:{}:{}", self.as_str(), participant_id(participant), since)
    }
}

// Index entity ids are lowercase hex.
fn participant_id(participant: Address) -> String {
    participant.to_string().to_lowercase()
}

/// Typed staking reads for one gateway.
#[derive(Debug, Clone)]
pub struct StakingDataSource {
    gateway: Arc<CacheAsideGateway>,
    ttl: Duration,
}

impl StakingDataSource {
    /// Uses the gateway's default cache ttl.
    pub fn new(gateway: Arc<CacheAsideGateway>) -> Self {
        let ttl = gateway.default_ttl();
        Self { gateway, ttl }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn slashing_events(&self, participant: Address) -> IndexResult<SlashingEvents> {
        self.fetch(StakingQuery::Slashing, participant).await
    }

    pub async fn delegation_changes(&self, participant: Address) -> IndexResult<DelegationChanges> {
        self.fetch(StakingQuery::Delegations, participant).await
    }

    pub async fn reward_series(&self, participant: Address) -> IndexResult<RewardHistory> {
        self.fetch(StakingQuery::Rewards, participant).await
    }

    async fn fetch<T: IndexRecord>(&self, kind: StakingQuery, participant: Address) -> IndexResult<T> {
        // Read once so the key and the filter agree even if the window moves.
        let since = self.gateway.historical_timestamp().timestamp();
        let cache_key = kind.cache_key(participant, since);

        tracing::debug!(
            query = kind.as_str(),
            %participant,
            since,
            "Fetching staking data"
        );
        self.gateway
            .query_index(&cache_key, kind.build(participant, since), kind.priority(), self.ttl)
            .await
    }
}
