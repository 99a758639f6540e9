//! Venue configuration.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::decimal_or;
use crate::domain::{BookDelta, PriceLevel, VenueFees};

/// Settings for a single venue.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Whether this venue should be used.
    #[serde(default)]
    pub enabled: bool,
    /// Registry id of the adapter to build (defaults to the map key).
    pub kind: Option<String>,
    /// API key (loaded from environment variable).
    #[serde(skip)]
    pub api_key: String,
    /// API secret (loaded from environment variable).
    #[serde(skip)]
    pub api_secret: String,
    /// Optional API passphrase (loaded from environment variable).
    #[serde(skip)]
    pub api_password: Option<String>,
    /// Taker fee as a decimal string (e.g., "0.001" for 0.1%).
    pub fee_taker: Option<String>,
    /// Fixed base-asset withdrawal fee estimate (e.g., "0.0005").
    pub withdraw_fee_base: Option<String>,
    /// Fixed quote-asset withdrawal fee estimate (e.g., "1").
    pub withdraw_fee_quote: Option<String>,
    /// Starting balances for the simulated paper venue.
    pub paper: Option<PaperConfig>,
}

impl ExchangeConfig {
    /// Adapter id: explicit `kind` or the venue name itself.
    pub fn kind<'a>(&'a self, name: &'a str) -> &'a str {
        self.kind.as_deref().unwrap_or(name)
    }

    /// Fee figures parsed from config; unset values are zero.
    pub fn fees(&self) -> VenueFees {
        VenueFees::new(
            decimal_or(self.fee_taker.as_ref(), Decimal::ZERO),
            decimal_or(self.withdraw_fee_base.as_ref(), Decimal::ZERO),
            decimal_or(self.withdraw_fee_quote.as_ref(), Decimal::ZERO),
        )
    }
}

/// Simulated account settings for the paper venue.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperConfig {
    /// Starting free base balance (e.g., "1.5").
    pub base_balance: Option<String>,
    /// Starting free quote balance (e.g., "10000").
    pub quote_balance: Option<String>,
    /// Ask levels the paper feed starts from, each `[price, quantity]`.
    #[serde(default)]
    pub asks: Vec<[String; 2]>,
    /// Bid levels the paper feed starts from, each `[price, quantity]`.
    #[serde(default)]
    pub bids: Vec<[String; 2]>,
}

impl PaperConfig {
    pub fn base_balance(&self) -> Decimal {
        decimal_or(self.base_balance.as_ref(), Decimal::ZERO)
    }

    pub fn quote_balance(&self) -> Decimal {
        decimal_or(self.quote_balance.as_ref(), Decimal::ZERO)
    }

    /// Snapshot replayed to every feed subscriber, if any level is set.
    pub fn book(&self) -> Option<BookDelta> {
        if self.asks.is_empty() && self.bids.is_empty() {
            return None;
        }
        let levels = |raw: &[[String; 2]]| {
            raw.iter()
                .map(|[price, quantity]| {
                    PriceLevel::new(
                        decimal_or(Some(price), Decimal::ZERO),
                        decimal_or(Some(quantity), Decimal::ZERO),
                    )
                })
                .collect::<Vec<_>>()
        };
        Some(BookDelta::snapshot(levels(&self.asks), levels(&self.bids)))
    }
}
