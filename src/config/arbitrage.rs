//! Arbitrage detection configuration.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use super::{decimal_or, duration};
use crate::domain::Direction;

/// Default interval between detection ticks.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of book levels aggregated per side.
const DEFAULT_MAX_LEVELS: usize = 5;

/// Arbitrage detection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ArbitrageConfig {
    /// Traded pair in "BASE/QUOTE" format (e.g., "BTC/USDT").
    pub pair: String,
    /// Key in `exchanges` of the first venue.
    pub first_venue: String,
    /// Key in `exchanges` of the second venue.
    pub second_venue: String,
    /// Minimum pure profit to buy on the first venue and sell on the second (e.g., "0.003").
    pub first_to_second_profit_limit: Option<String>,
    /// Minimum pure profit to buy on the second venue and sell on the first.
    pub second_to_first_profit_limit: Option<String>,
    /// Nominal base amount a round trip is priced with when estimating fees.
    pub base_coin_notional: Option<String>,
    /// Nominal quote amount held per venue. Informational.
    pub quote_coin_notional: Option<String>,
    /// Price fees as if holdings are split evenly across both venues.
    #[serde(default = "default_true")]
    pub bisect_across_venues: bool,
    /// Include withdrawal fee estimates in the fee rate.
    #[serde(default)]
    pub enable_cross_venue_transfer: bool,
    /// Interval between detection ticks (default: 1s).
    #[serde(default, with = "duration")]
    pub tick_interval: Duration,
    /// Book levels aggregated per side (default: 5).
    pub max_levels: Option<usize>,
}

impl ArbitrageConfig {
    /// Pure profit threshold for the given direction.
    pub fn profit_limit(&self, direction: Direction) -> Decimal {
        let value = match direction {
            Direction::FirstToSecond => self.first_to_second_profit_limit.as_ref(),
            Direction::SecondToFirst => self.second_to_first_profit_limit.as_ref(),
        };
        decimal_or(value, Decimal::ZERO)
    }

    pub fn base_coin_notional(&self) -> Decimal {
        decimal_or(self.base_coin_notional.as_ref(), Decimal::ONE)
    }

    pub fn tick_interval(&self) -> Duration {
        if self.tick_interval.is_zero() {
            DEFAULT_TICK_INTERVAL
        } else {
            self.tick_interval
        }
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
            .filter(|levels| *levels > 0)
            .unwrap_or(DEFAULT_MAX_LEVELS)
    }

    /// Base currency of the pair ("BTC" for "BTC/USDT").
    pub fn base_coin(&self) -> &str {
        self.pair.split('/').next().unwrap_or_default()
    }

    /// Quote currency of the pair ("USDT" for "BTC/USDT").
    pub fn quote_coin(&self) -> &str {
        self.pair.split('/').nth(1).unwrap_or_default()
    }
}

fn default_true() -> bool {
    true
}
