//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ceilings > 0)
//! - Check cross-field constraints (dispatch deadline vs transport timeout)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{GatewayConfig, HistoricalWindowConfig};

/// Longest historical window accepted, in years.
pub const MAX_WINDOW_YEARS: u32 = 100;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("index.endpoint '{0}' is not a valid URL")]
    InvalidEndpoint(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error(
        "scheduler.dispatch_timeout_ms ({dispatch_ms}) must be shorter than index.request_timeout_secs ({request_secs}s)"
    )]
    DispatchTimeoutTooLong { dispatch_ms: u64, request_secs: u64 },

    #[error("historical window must go back at least one day")]
    EmptyWindow,

    #[error("historical window exceeds {} years", MAX_WINDOW_YEARS)]
    WindowTooLong,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a full configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if url::Url::parse(&config.index.endpoint).is_err() {
        errors.push(ValidationError::InvalidEndpoint(config.index.endpoint.clone()));
    }
    if config.index.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "index.request_timeout_secs",
        });
    }

    let scheduler = &config.scheduler;
    if scheduler.max_concurrent_requests == 0 {
        errors.push(ValidationError::Zero {
            field: "scheduler.max_concurrent_requests",
        });
    }
    if scheduler.tick_interval_ms == 0 {
        errors.push(ValidationError::Zero {
            field: "scheduler.tick_interval_ms",
        });
    }
    if scheduler.dispatch_timeout_ms == 0 {
        errors.push(ValidationError::Zero {
            field: "scheduler.dispatch_timeout_ms",
        });
    }
    if scheduler.memo_sweep_interval_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "scheduler.memo_sweep_interval_secs",
        });
    }
    // The local deadline has to fire first so timeouts are attributable.
    if scheduler.dispatch_timeout_ms >= config.index.request_timeout_secs.saturating_mul(1000) {
        errors.push(ValidationError::DispatchTimeoutTooLong {
            dispatch_ms: scheduler.dispatch_timeout_ms,
            request_secs: config.index.request_timeout_secs,
        });
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::Zero {
            field: "circuit_breaker.failure_threshold",
        });
    }
    if config.circuit_breaker.recovery_timeout_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "circuit_breaker.recovery_timeout_secs",
        });
    }

    if config.cache.eviction_interval_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "cache.eviction_interval_secs",
        });
    }

    if let Err(e) = validate_window(&config.historical) {
        errors.push(e);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a historical window on its own (also used for live updates).
pub fn validate_window(window: &HistoricalWindowConfig) -> Result<(), ValidationError> {
    if window.years_back == 0 && window.months_back == 0 && window.days_back == 0 {
        return Err(ValidationError::EmptyWindow);
    }
    let total_days = u64::from(window.years_back) * 366
        + u64::from(window.months_back) * 31
        + u64::from(window.days_back);
    if total_days > u64::from(MAX_WINDOW_YEARS) * 366 {
        return Err(ValidationError::WindowTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.index.endpoint = "::nope".to_string();
        config.scheduler.max_concurrent_requests = 0;
        config.circuit_breaker.failure_threshold = 0;
        config.cache.eviction_interval_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::InvalidEndpoint("::nope".into())));
        assert!(errors.contains(&ValidationError::Zero {
            field: "scheduler.max_concurrent_requests"
        }));
        assert!(errors.contains(&ValidationError::Zero {
            field: "cache.eviction_interval_secs"
        }));
    }

    #[test]
    fn test_dispatch_timeout_must_undercut_transport() {
        let mut config = GatewayConfig::default();
        config.scheduler.dispatch_timeout_ms = 30_000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DispatchTimeoutTooLong {
                dispatch_ms: 30_000,
                request_secs: 30
            }]
        );
    }

    #[test]
    fn test_window_bounds() {
        let empty = HistoricalWindowConfig {
            years_back: 0,
            months_back: 0,
            days_back: 0,
        };
        assert_eq!(validate_window(&empty), Err(ValidationError::EmptyWindow));

        let huge = HistoricalWindowConfig {
            years_back: 101,
            months_back: 0,
            days_back: 0,
        };
        assert_eq!(validate_window(&huge), Err(ValidationError::WindowTooLong));

        let days_only = HistoricalWindowConfig {
            years_back: 0,
            months_back: 0,
            days_back: 7,
        };
        assert!(validate_window(&days_only).is_ok());
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = GatewayConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::InvalidMetricsAddress("nowhere".into())]
        );
    }
}
