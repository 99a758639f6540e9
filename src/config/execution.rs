//! Execution configuration.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use super::{decimal_or, duration};

const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(3),
];
const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(3600);
const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_STOP_LOSS_SLIPPAGE: Decimal = Decimal::from_parts(2, 0, 0, false, 3);

/// Order execution settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionConfig {
    /// Wait after placing an order before the first status check (default: 1s).
    #[serde(default, with = "duration")]
    pub settle_delay: Duration,
    /// Waits before each follow-up status check (default: [1s, 2s, 3s]).
    #[serde(default, with = "duration::list")]
    pub retry_delays: Vec<Duration>,
    /// Cancel a sell leg still open after the last check (default: true).
    pub cancel_unfilled_sell: Option<bool>,
    /// Extra margin on the stop-loss replacement price (default: "0.002").
    pub stop_loss_slippage: Option<String>,
    /// Pause of the trading loop after a failed trading attempt (default: 1h).
    #[serde(default, with = "duration")]
    pub error_backoff: Duration,
    /// Wait for books to fill after subscribing, before the first tick (default: 10s).
    #[serde(default, with = "duration")]
    pub startup_delay: Duration,
}

impl ExecutionConfig {
    pub fn settle_delay(&self) -> Duration {
        if self.settle_delay.is_zero() {
            DEFAULT_SETTLE_DELAY
        } else {
            self.settle_delay
        }
    }

    pub fn retry_delays(&self) -> Vec<Duration> {
        if self.retry_delays.is_empty() {
            DEFAULT_RETRY_DELAYS.to_vec()
        } else {
            self.retry_delays.clone()
        }
    }

    pub fn cancel_unfilled_sell(&self) -> bool {
        self.cancel_unfilled_sell.unwrap_or(true)
    }

    pub fn stop_loss_slippage(&self) -> Decimal {
        decimal_or(self.stop_loss_slippage.as_ref(), DEFAULT_STOP_LOSS_SLIPPAGE)
    }

    pub fn error_backoff(&self) -> Duration {
        if self.error_backoff.is_zero() {
            DEFAULT_ERROR_BACKOFF
        } else {
            self.error_backoff
        }
    }

    pub fn startup_delay(&self) -> Duration {
        if self.startup_delay.is_zero() {
            DEFAULT_STARTUP_DELAY
        } else {
            self.startup_delay
        }
    }
}
