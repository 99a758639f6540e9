//! Risk management configuration.

use serde::Deserialize;

/// Default ceiling on resting orders per venue.
pub const DEFAULT_MAX_OPEN_ORDERS: i32 = 10;

/// Risk management settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RiskConfig {
    /// Smallest trade worth placing, in quote currency (e.g., "10").
    pub min_trade_size_quote: Option<String>,
    /// Largest single trade, in quote currency (e.g., "500").
    pub max_trade_size_quote: Option<String>,
    /// Maximum number of open orders allowed on either venue.
    pub max_open_orders: Option<i32>,
}

impl RiskConfig {
    pub fn max_open_orders(&self) -> i32 {
        self.max_open_orders.unwrap_or(DEFAULT_MAX_OPEN_ORDERS)
    }
}
