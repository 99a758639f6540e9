//! Trade size and open order limits.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::config::RiskConfig;

/// Enforces the configured trade size bounds and open order ceiling.
#[derive(Debug, Clone)]
pub struct RiskLimiter {
    /// Smallest trade in quote currency. `None` means no minimum.
    min_trade_size_quote: Option<Decimal>,
    /// Largest trade in quote currency. `None` means no maximum.
    max_trade_size_quote: Option<Decimal>,
    max_open_orders: usize,
}

impl RiskLimiter {
    pub fn new(
        min_trade_size_quote: Option<Decimal>,
        max_trade_size_quote: Option<Decimal>,
        max_open_orders: usize,
    ) -> Self {
        Self {
            min_trade_size_quote,
            max_trade_size_quote,
            max_open_orders,
        }
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        let parse = |value: Option<&String>| value.and_then(|s| Decimal::from_str(s.trim()).ok());
        Self::new(
            parse(config.min_trade_size_quote.as_ref()),
            parse(config.max_trade_size_quote.as_ref()),
            usize::try_from(config.max_open_orders()).unwrap_or_default(),
        )
    }

    /// Minimum base amount worth trading at `price`.
    pub fn min_trade_size(&self, price: Decimal) -> Decimal {
        match self.min_trade_size_quote {
            Some(min) if price > Decimal::ZERO => min / price,
            _ => Decimal::ZERO,
        }
    }

    /// Maximum base amount of a single trade at `price`, if bounded.
    pub fn max_trade_size(&self, price: Decimal) -> Option<Decimal> {
        match self.max_trade_size_quote {
            Some(max) if price > Decimal::ZERO => Some(max / price),
            _ => None,
        }
    }

    /// Returns true if a venue with `count` open orders may not receive more.
    pub fn open_orders_exceeded(&self, count: usize) -> bool {
        count >= self.max_open_orders
    }
}
