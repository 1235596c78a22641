use arc_swap::ArcSwap;
use chrono::{DateTime, Months, TimeDelta, Utc};
use std::sync::Arc;

use crate::config::validation::{validate_window, ValidationError};
use crate::config::HistoricalWindowConfig;

/// `now` minus the configured offset.
///
/// Calendar arithmetic clamps to the end of shorter months
/// (Mar 31 minus one month is Feb 28/29).
pub fn derive_lower_bound(now: DateTime<Utc>, window: &HistoricalWindowConfig) -> DateTime<Utc> {
    let months = window
        .years_back
        .saturating_mul(12)
        .saturating_add(window.months_back);
    now.checked_sub_months(Months::new(months))
        .and_then(|t| t.checked_sub_signed(TimeDelta::days(i64::from(window.days_back))))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// An offset together with the bound derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub config: HistoricalWindowConfig,
    pub timestamp: DateTime<Utc>,
}

impl WindowSnapshot {
    fn derive(config: HistoricalWindowConfig, now: DateTime<Utc>) -> Self {
        Self {
            config,
            timestamp: derive_lower_bound(now, &config),
        }
    }
}

/// Shared, atomically swappable historical window.
pub struct HistoricalWindow {
    current: ArcSwap<WindowSnapshot>,
}

impl HistoricalWindow {
    pub fn new(config: HistoricalWindowConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(WindowSnapshot::derive(config, Utc::now())),
        }
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        **self.current.load()
    }

    pub fn config(&self) -> HistoricalWindowConfig {
        self.current.load().config
    }

    /// The derived lower bound. Fixed until the next `update`.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.current.load().timestamp
    }

    /// Replace the offset and recompute the bound from the current time.
    pub fn update(&self, config: HistoricalWindowConfig) -> Result<WindowSnapshot, ValidationError> {
        validate_window(&config)?;
        let snapshot = WindowSnapshot::derive(config, Utc::now());
        self.current.store(Arc::new(snapshot));
        tracing::info!(
            years_back = config.years_back,
            months_back = config.months_back,
            days_back = config.days_back,
            historical_timestamp = %snapshot.timestamp,
            "Historical window updated"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window(years_back: u32, months_back: u32, days_back: u32) -> HistoricalWindowConfig {
        HistoricalWindowConfig {
            years_back,
            months_back,
            days_back,
        }
    }

    #[test]
    fn test_derive_lower_bound() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();

        assert_eq!(
            derive_lower_bound(now, &window(1, 0, 0)),
            Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap()
        );
        assert_eq!(
            derive_lower_bound(now, &window(1, 2, 10)),
            Utc.with_ymd_and_hms(2023, 4, 5, 12, 0, 0).unwrap()
        );
        assert_eq!(
            derive_lower_bound(now, &window(0, 0, 7)),
            Utc.with_ymd_and_hms(2024, 6, 8, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_month_end_clamps() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
        assert_eq!(
            derive_lower_bound(now, &window(0, 1, 0)),
            Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_update_swaps_config_and_bound_together() {
        let history = HistoricalWindow::new(window(1, 0, 0));
        let before = history.snapshot();

        let after = history.update(window(0, 0, 30)).unwrap();
        assert_eq!(history.config(), window(0, 0, 30));
        assert_eq!(history.timestamp(), after.timestamp);
        assert!(after.timestamp > before.timestamp);
    }

    #[test]
    fn test_invalid_update_keeps_previous_window() {
        let history = HistoricalWindow::new(window(1, 0, 0));
        let before = history.snapshot();

        assert_eq!(
            history.update(window(0, 0, 0)),
            Err(ValidationError::EmptyWindow)
        );
        assert_eq!(history.snapshot(), before);
    }
}
