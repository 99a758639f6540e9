//! Balance refresh and alert configuration.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use super::{decimal_or, duration};

/// Default interval for the periodic balance refresh.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(180);

/// Balance refresh and low-balance alert settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BalanceConfig {
    /// Interval for periodic balance and open-order refresh (default: 180s).
    #[serde(default, with = "duration")]
    pub refresh_interval: Duration,
    /// Alert when a venue's free base balance drops below this amount.
    pub base_alert_threshold: Option<String>,
    /// Alert when a venue's free quote balance drops below this amount.
    pub quote_alert_threshold: Option<String>,
}

impl BalanceConfig {
    pub fn refresh_interval(&self) -> Duration {
        if self.refresh_interval.is_zero() {
            DEFAULT_REFRESH_INTERVAL
        } else {
            self.refresh_interval
        }
    }

    pub fn base_alert_threshold(&self) -> Decimal {
        decimal_or(self.base_alert_threshold.as_ref(), Decimal::ZERO)
    }

    pub fn quote_alert_threshold(&self) -> Decimal {
        decimal_or(self.quote_alert_threshold.as_ref(), Decimal::ZERO)
    }
}
