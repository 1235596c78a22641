//! Typed staking records decoded at the index boundary.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::index::{IndexError, IndexRecord, IndexResult};

/// One slashing event against a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlashingEvent {
    pub id: String,
    pub participant: Address,
    #[serde(deserialize_with = "de_u256")]
    pub amount: U256,
    #[serde(deserialize_with = "de_u64")]
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlashingEvents {
    pub slash_events: Vec<SlashingEvent>,
}

impl IndexRecord for SlashingEvents {}

/// Direction of a delegation change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelegationKind {
    Delegate,
    Undelegate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationChange {
    pub id: String,
    pub delegator: Address,
    pub kind: DelegationKind,
    #[serde(deserialize_with = "de_u256")]
    pub amount: U256,
    #[serde(deserialize_with = "de_u64")]
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationChanges {
    pub delegation_changes: Vec<DelegationChange>,
}

impl DelegationChanges {
    /// Net delegated amount over the window; `None` if it went negative.
    pub fn net_delegated(&self) -> Option<U256> {
        self.delegation_changes
            .iter()
            .try_fold(U256::ZERO, |acc, change| match change.kind {
                DelegationKind::Delegate => acc.checked_add(change.amount),
                DelegationKind::Undelegate => acc.checked_sub(change.amount),
            })
    }
}

impl IndexRecord for DelegationChanges {}

/// Parallel reward series: `amounts[i]` was paid at `timestamps[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardSeries {
    #[serde(deserialize_with = "de_u64_vec")]
    pub timestamps: Vec<u64>,
    #[serde(deserialize_with = "de_u256_vec")]
    pub amounts: Vec<U256>,
}

impl RewardSeries {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn total(&self) -> U256 {
        self.amounts
            .iter()
            .fold(U256::ZERO, |acc, amount| acc.saturating_add(*amount))
    }
}

/// Envelope for the reward series query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardHistory {
    pub reward_series: RewardSeries,
}

impl IndexRecord for RewardHistory {
    fn validate(&self) -> IndexResult<()> {
        let series = &self.reward_series;
        if series.timestamps.len() != series.amounts.len() {
            return Err(IndexError::DimensionMismatch {
                context: "reward series amounts".to_string(),
                expected: series.timestamps.len(),
                actual: series.amounts.len(),
            });
        }
        Ok(())
    }
}

// Indexes usually encode big integers as decimal strings; accept plain
// JSON numbers too.

fn parse_u256(value: &Value) -> Result<U256, String> {
    match value {
        Value::String(s) => U256::from_str_radix(s, 10).map_err(|e| format!("{s:?}: {e}")),
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("{n} is not an unsigned integer")),
        other => Err(format!("expected integer, got {other}")),
    }
}

fn parse_u64(value: &Value) -> Result<u64, String> {
    match value {
        Value::String(s) => s.parse().map_err(|e| format!("{s:?}: {e}")),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| format!("{n} is not an unsigned integer")),
        other => Err(format!("expected integer, got {other}")),
    }
}

fn de_u256<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    parse_u256(&Value::deserialize(deserializer)?).map_err(serde::de::Error::custom)
}

fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    parse_u64(&Value::deserialize(deserializer)?).map_err(serde::de::Error::custom)
}

fn de_u256_vec<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<U256>, D::Error> {
    Vec::<Value>::deserialize(deserializer)?
        .iter()
        .map(parse_u256)
        .collect::<Result<_, _>>()
        .map_err(serde::de::Error::custom)
}

fn de_u64_vec<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u64>, D::Error> {
    Vec::<Value>::deserialize(deserializer)?
        .iter()
        .map(parse_u64)
        .collect::<Result<_, _>>()
        .map_err(serde::de::Error::custom)
}
