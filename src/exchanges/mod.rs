//! Venue integration abstractions and the built-in paper venue.

mod paper;
mod registry;

use crate::domain::{BookDelta, Order, OrderSide};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;

pub use paper::{PaperExchange, PaperFeed};
pub use registry::{VenueHandle, VenueRegistry};

/// Exchange errors.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Trading pair is not supported by this venue.
    #[error("pair {0} is not supported")]
    PairNotSupported(String),

    /// Insufficient funds for the operation.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Order not found.
    #[error("order {0} not found")]
    OrderNotFound(String),

    /// API error from the venue.
    #[error("API error: {0}")]
    Api(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Operations a venue adapter declares support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub fetch_balance: bool,
    pub fetch_open_orders: bool,
    pub create_order: bool,
    pub cancel_order: bool,
    /// Optional: without it order status is derived from the open orders list.
    pub fetch_order: bool,
}

impl Capabilities {
    /// Every operation supported.
    pub const ALL: Capabilities = Capabilities {
        fetch_balance: true,
        fetch_open_orders: true,
        create_order: true,
        cancel_order: true,
        fetch_order: true,
    };

    /// Names of the required operations the venue lacks.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.fetch_balance {
            missing.push("fetch_balance");
        }
        if !self.fetch_open_orders {
            missing.push("fetch_open_orders");
        }
        if !self.create_order {
            missing.push("create_order");
        }
        if !self.cancel_order {
            missing.push("cancel_order");
        }
        missing
    }
}

/// Exchange trait defines the trading interface of a venue adapter.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Name returns the configured identifier of this venue.
    fn name(&self) -> &str;

    /// Capabilities lists which operations this adapter implements.
    fn capabilities(&self) -> Capabilities;

    /// FetchBalance returns free balances keyed by asset symbol (e.g., "BTC", "USDT").
    /// Assets missing from the map are treated as zero.
    async fn fetch_balance(&self) -> Result<HashMap<String, Decimal>>;

    /// FetchOpenOrders returns the orders still resting on the book for a pair.
    async fn fetch_open_orders(&self, pair: &str) -> Result<Vec<Order>>;

    /// CreateLimitOrder submits a limit order.
    /// The returned order may carry no status when the venue does not report one.
    async fn create_limit_order(
        &self,
        side: OrderSide,
        pair: &str,
        amount: Decimal,
        price: Decimal,
    ) -> Result<Order>;

    /// FetchOrder retrieves the current state of an order by its ID.
    /// Only called when `capabilities().fetch_order` is true.
    async fn fetch_order(&self, order_id: &str, pair: &str) -> Result<Order>;

    /// CancelOrder cancels an open order by its ID.
    async fn cancel_order(&self, order_id: &str, pair: &str) -> Result<()>;
}

/// MarketDataFeed streams order book deltas for a pair.
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    /// Subscribe opens a stream of deltas.
    /// The first delta of a stream is expected to be a full snapshot.
    /// The channel is closed when the feed stops.
    async fn subscribe(&self, pair: &str) -> Result<mpsc::UnboundedReceiver<BookDelta>>;
}
