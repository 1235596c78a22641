//! Circuit breaker for index protection.
//!
//! # States
//! - Closed: normal operation, the scheduler drains the queue
//! - Open: index assumed down, nothing is dispatched
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold (consecutive, no success in between)
//! Open → Closed: checked lazily, once now - last_failure_at > recovery_timeout
//! ```
//!
//! # Design Decisions
//! - One breaker for the whole index (there is a single upstream)
//! - No half-open probe: the first dispatch after the cool-down decides by its
//!   own outcome whether the circuit stays closed or trips again
//! - Closing resets the failure count, so one more failure does not reopen it

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

/// Consecutive-failure circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    failure_threshold: u32,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            failure_threshold,
            recovery_timeout,
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(
            config.failure_threshold,
            Duration::from_secs(config.recovery_timeout_secs),
        )
    }

    /// Whether the circuit is open. Closes it if the cool-down has elapsed.
    pub fn is_open(&self) -> bool {
        let mut state = self.lock();
        if state.failure_count < self.failure_threshold {
            return false;
        }

        let cooled_down = state
            .last_failure_at
            .map(|at| at.elapsed() > self.recovery_timeout)
            .unwrap_or(true);
        if cooled_down {
            state.failure_count = 0;
            metrics::record_circuit_state(false);
            tracing::info!(
                recovery_timeout_secs = self.recovery_timeout.as_secs(),
                "Circuit breaker closed after cool-down"
            );
            return false;
        }
        true
    }

    /// Report a successful dispatch.
    pub fn record_success(&self) {
        let mut state = self.lock();
        if state.failure_count > 0 {
            tracing::debug!(previous_failures = state.failure_count, "Failure count reset");
        }
        state.failure_count = 0;
    }

    /// Report a failed dispatch.
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_at = Some(Instant::now());

        if state.failure_count == self.failure_threshold {
            metrics::record_circuit_state(true);
            tracing::warn!(
                failures = state.failure_count,
                recovery_timeout_secs = self.recovery_timeout.as_secs(),
                "Circuit breaker opened"
            );
        }
    }

    /// Current consecutive failure count.
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    // Counters stay meaningful after a panic elsewhere, so recover from poison.
    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
