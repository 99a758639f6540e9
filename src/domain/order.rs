//! Core business entities for trading orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// OrderSide represents the direction of an order (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// OrderSideBuy indicates a buy order.
    Buy,
    /// OrderSideSell indicates a sell order.
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// OrderStatus represents the lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// The order is resting on the book, possibly partially filled.
    Open,
    /// The order has been completely filled.
    Closed,
    /// The order was cancelled; `filled` holds whatever executed before.
    Cancelled,
}

/// Order represents a limit order on a venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Remote identifier assigned by the venue.
    pub id: String,
    /// Name of the venue where the order is placed.
    pub exchange: String,
    /// Pair in "BASE/QUOTE" format (e.g., "BTC/USDT").
    pub pair: String,
    pub side: OrderSide,
    /// Requested limit price.
    pub price: Decimal,
    /// Requested amount of base currency.
    pub amount: Decimal,
    /// Amount of base currency executed so far.
    pub filled: Decimal,
    /// Amount of base currency still waiting to execute.
    pub remaining: Decimal,
    /// Lifecycle state. `None` when the venue acknowledged the order
    /// without reporting a state; the caller has to fetch it.
    pub status: Option<OrderStatus>,
    pub created_at: SystemTime,
}

impl Order {
    /// Returns true if the order is known to be completely filled.
    pub fn is_closed(&self) -> bool {
        self.status == Some(OrderStatus::Closed)
    }

    /// Returns true if the order is known to be resting on the book.
    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.status == Some(OrderStatus::Open)
    }
}
