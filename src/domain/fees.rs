//! Venue fee structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// VenueFees holds the fee figures used to estimate a round trip on one venue.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VenueFees {
    /// Taker fee (for orders that remove liquidity).
    /// Expressed as a decimal (e.g., 0.001 for 0.1%).
    pub taker: Decimal,
    /// Fixed withdrawal fee estimate for the base asset, in base units.
    pub withdraw_base: Decimal,
    /// Fixed withdrawal fee estimate for the quote asset, in quote units.
    pub withdraw_quote: Decimal,
}

impl VenueFees {
    /// Creates a new VenueFees instance.
    pub fn new(taker: Decimal, withdraw_base: Decimal, withdraw_quote: Decimal) -> Self {
        Self {
            taker,
            withdraw_base,
            withdraw_quote,
        }
    }
}
