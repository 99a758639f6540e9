//! Arbitrage opportunity domain model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Quote;

/// Position of a venue in the configured pair of venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueSlot {
    First,
    Second,
}

impl VenueSlot {
    pub const ALL: [VenueSlot; 2] = [VenueSlot::First, VenueSlot::Second];

    /// Index into two-element per-venue arrays.
    pub fn index(self) -> usize {
        match self {
            VenueSlot::First => 0,
            VenueSlot::Second => 1,
        }
    }

    pub fn other(self) -> VenueSlot {
        match self {
            VenueSlot::First => VenueSlot::Second,
            VenueSlot::Second => VenueSlot::First,
        }
    }
}

impl std::fmt::Display for VenueSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VenueSlot::First => write!(f, "first"),
            VenueSlot::Second => write!(f, "second"),
        }
    }
}

/// Direction of a trade pair: buy on one venue, sell on the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Buy on the first venue, sell on the second.
    FirstToSecond,
    /// Buy on the second venue, sell on the first.
    SecondToFirst,
}

impl Direction {
    /// Evaluation order within a tick.
    pub const ALL: [Direction; 2] = [Direction::FirstToSecond, Direction::SecondToFirst];

    /// Venue whose asks are bought.
    pub fn buy_slot(self) -> VenueSlot {
        match self {
            Direction::FirstToSecond => VenueSlot::First,
            Direction::SecondToFirst => VenueSlot::Second,
        }
    }

    /// Venue whose bids are sold into.
    pub fn sell_slot(self) -> VenueSlot {
        self.buy_slot().other()
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::FirstToSecond => write!(f, "first_to_second"),
            Direction::SecondToFirst => write!(f, "second_to_first"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_to_second" => Ok(Direction::FirstToSecond),
            "second_to_first" => Ok(Direction::SecondToFirst),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

/// Opportunity represents an accepted, sized arbitrage opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub direction: Direction,
    /// Trading pair (e.g., "BTC/USDT").
    pub pair: String,
    /// Venue where to buy.
    pub buy_exchange: String,
    /// Venue where to sell.
    pub sell_exchange: String,
    /// Executable ask on the buy venue.
    pub ask: Quote,
    /// Executable bid on the sell venue.
    pub bid: Quote,
    /// (bid - ask) / ask.
    pub premium_rate: Decimal,
    /// Estimated round-trip fee rate.
    pub fee_rate: Decimal,
    /// premium_rate - fee_rate.
    pub pure_profit: Decimal,
    /// Base amount to buy, bounded by depth, balances and risk limits.
    pub quantity: Decimal,
    /// When this opportunity was detected.
    pub detected_at: DateTime<Utc>,
}

impl Opportunity {
    /// The lower of the two executable prices, used for size limits.
    pub fn min_price(&self) -> Decimal {
        self.ask.price.min(self.bid.price)
    }

    /// Rough profit estimate in quote currency for a filled amount.
    pub fn estimated_profit(&self, filled: Decimal) -> Decimal {
        filled * self.ask.price * self.pure_profit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_direction_slots() {
        assert_eq!(Direction::FirstToSecond.buy_slot(), VenueSlot::First);
        assert_eq!(Direction::FirstToSecond.sell_slot(), VenueSlot::Second);
        assert_eq!(Direction::SecondToFirst.buy_slot(), VenueSlot::Second);
        assert_eq!(Direction::SecondToFirst.sell_slot(), VenueSlot::First);
    }

    #[test]
    fn test_direction_string_form() {
        for direction in Direction::ALL {
            let parsed = Direction::from_str(&direction.to_string()).unwrap();
            assert_eq!(parsed, direction);
        }
        assert!(Direction::from_str("sideways").is_err());
    }
}
