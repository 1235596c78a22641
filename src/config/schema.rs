//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Upstream index endpoint and transport timeouts.
    pub index: IndexConfig,

    /// Dedup queue and dispatch settings.
    pub scheduler: SchedulerConfig,

    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Cache-aside settings.
    pub cache: CacheConfig,

    /// Lower bound applied to every time-bounded query.
    pub historical: HistoricalWindowConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Index connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Query endpoint URL.
    pub endpoint: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Transport-level request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/subgraphs/name/staking".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Ceiling on concurrently executing index requests.
    pub max_concurrent_requests: usize,

    /// Interval between queue drains in milliseconds.
    pub tick_interval_ms: u64,

    /// Local deadline for one dispatch in milliseconds.
    /// Must stay below `index.request_timeout_secs`.
    pub dispatch_timeout_ms: u64,

    /// How long completed outcomes stay in the processed memo.
    pub memo_ttl_secs: u64,

    /// Interval between memo sweeps.
    pub memo_sweep_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 5,
            tick_interval_ms: 100,
            dispatch_timeout_ms: 25_000,
            memo_ttl_secs: 3600,
            memo_sweep_interval_secs: 300,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn memo_ttl(&self) -> Duration {
        Duration::from_secs(self.memo_ttl_secs)
    }

    pub fn memo_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.memo_sweep_interval_secs)
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Cool-down after the last failure before the circuit closes again.
    pub recovery_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL used when a caller does not pick one.
    pub default_ttl_secs: u64,

    /// Snapshot file for the in-memory store (loaded at start, saved on exit).
    pub persistence_path: Option<String>,

    /// How long an expired entry stays available to stale reads.
    pub stale_grace_secs: u64,

    /// Interval between evictions of entries past the stale grace.
    pub eviction_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 300,
            persistence_path: None,
            stale_grace_secs: 86_400,
            eviction_interval_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn stale_grace(&self) -> Duration {
        Duration::from_secs(self.stale_grace_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }
}

/// Offset from now that bounds historical queries from below.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoricalWindowConfig {
    pub years_back: u32,
    pub months_back: u32,
    pub days_back: u32,
}

impl Default for HistoricalWindowConfig {
    fn default() -> Self {
        Self {
            years_back: 1,
            months_back: 0,
            days_back: 0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.scheduler.max_concurrent_requests, 5);
        assert_eq!(config.scheduler.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.scheduler.dispatch_timeout(), Duration::from_secs(25));
        assert_eq!(config.scheduler.memo_ttl(), Duration::from_secs(3600));
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.recovery_timeout_secs, 60);
        assert_eq!(config.index.request_timeout_secs, 30);
        assert_eq!(config.cache.stale_grace(), Duration::from_secs(86_400));
        assert_eq!(config.cache.eviction_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [scheduler]
            max_concurrent_requests = 3

            [historical]
            months_back = 6
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.max_concurrent_requests, 3);
        assert_eq!(config.scheduler.tick_interval_ms, 100);
        assert_eq!(config.historical.months_back, 6);
        assert_eq!(config.historical.years_back, 1);
        assert_eq!(config.circuit_breaker, CircuitBreakerConfig::default());
    }
}
