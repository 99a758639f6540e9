//! Orderbook data structures.
//!
//! Each side is kept as a sorted price → quantity map so that incremental
//! feed updates and best-first walks are both cheap.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// PriceLevel represents a single price level in the orderbook.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    /// Zero quantity in a delta means "remove this level".
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

/// Side of the book a map belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Resting sell orders, best = lowest price.
    Ask,
    /// Resting buy orders, best = highest price.
    Bid,
}

/// An executable price and the volume aggregated to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quote {
    /// Worst price touched while aggregating.
    pub price: Decimal,
    /// Total volume across the levels visited.
    pub volume: Decimal,
}

impl Quote {
    pub const ZERO: Quote = Quote {
        price: Decimal::ZERO,
        volume: Decimal::ZERO,
    };

    pub fn new(price: Decimal, volume: Decimal) -> Self {
        Self { price, volume }
    }
}

/// Update pushed by a market data feed.
///
/// `full = true` replaces both sides of the book; otherwise levels are
/// merged into what is already there.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookDelta {
    pub full: bool,
    pub asks: Vec<PriceLevel>,
    pub bids: Vec<PriceLevel>,
}

impl BookDelta {
    /// Creates a replace-all delta.
    pub fn snapshot(asks: Vec<PriceLevel>, bids: Vec<PriceLevel>) -> Self {
        Self {
            full: true,
            asks,
            bids,
        }
    }

    /// Creates an incremental delta.
    pub fn update(asks: Vec<PriceLevel>, bids: Vec<PriceLevel>) -> Self {
        Self {
            full: false,
            asks,
            bids,
        }
    }
}

/// One side of an orderbook keyed by price. Only non-zero levels are stored.
#[derive(Debug, Clone)]
pub struct BookSide {
    side: Side,
    levels: BTreeMap<Decimal, Decimal>,
}

impl BookSide {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Returns the stored quantity at `price`, if any.
    #[cfg(test)]
    pub fn get(&self, price: Decimal) -> Option<Decimal> {
        self.levels.get(&price).copied()
    }

    /// Applies one level: zero quantity deletes the price (no-op when
    /// absent), anything else overwrites it.
    ///
    /// Returns false if the level was rejected for a non-positive price or a
    /// negative quantity.
    pub fn apply_level(&mut self, level: PriceLevel) -> bool {
        if level.price <= Decimal::ZERO {
            return false;
        }
        if level.quantity.is_sign_negative() && !level.quantity.is_zero() {
            return false;
        }
        if level.quantity.is_zero() {
            self.levels.remove(&level.price);
        } else {
            self.levels.insert(level.price, level.quantity);
        }
        true
    }

    /// Returns the best level: lowest ask or highest bid.
    pub fn best(&self) -> Option<PriceLevel> {
        let entry = match self.side {
            Side::Ask => self.levels.first_key_value(),
            Side::Bid => self.levels.last_key_value(),
        };
        entry.map(|(price, quantity)| PriceLevel::new(*price, *quantity))
    }

    /// Iterates levels best-first.
    pub fn iter(&self) -> Box<dyn Iterator<Item = PriceLevel> + '_> {
        let levels = self
            .levels
            .iter()
            .map(|(price, quantity)| PriceLevel::new(*price, *quantity));
        match self.side {
            Side::Ask => Box::new(levels),
            Side::Bid => Box::new(levels.rev()),
        }
    }

    /// Walks at most `max_levels` levels best-first, summing volume until the
    /// total reaches `min_executable(price)` at the current level.
    ///
    /// The returned price is the worst price included, not a volume-weighted
    /// average. Detection thresholds are tuned against this approximation.
    pub fn aggregate<F>(&self, max_levels: usize, min_executable: F) -> Quote
    where
        F: Fn(Decimal) -> Decimal,
    {
        let mut quote = Quote::ZERO;
        for level in self.iter().take(max_levels) {
            quote.price = level.price;
            quote.volume += level.quantity;
            if quote.volume >= min_executable(quote.price) {
                break;
            }
        }
        quote
    }
}

/// Orderbook represents the current state of bids and asks on one venue.
#[derive(Debug, Clone)]
pub struct Orderbook {
    /// The venue name this orderbook belongs to.
    pub exchange: String,
    pub asks: BookSide,
    pub bids: BookSide,
}

impl Orderbook {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            asks: BookSide::new(Side::Ask),
            bids: BookSide::new(Side::Bid),
        }
    }

    /// Applies a feed delta. A full delta clears both sides first.
    pub fn apply(&mut self, delta: &BookDelta) {
        if delta.full {
            self.asks.clear();
            self.bids.clear();
        }

        let mut rejected = 0usize;
        for level in &delta.asks {
            if !self.asks.apply_level(*level) {
                rejected += 1;
            }
        }
        for level in &delta.bids {
            if !self.bids.apply_level(*level) {
                rejected += 1;
            }
        }

        if rejected > 0 {
            warn!(
                exchange = %self.exchange,
                rejected = rejected,
                "dropped levels with non-positive price or negative quantity"
            );
        }
    }

    /// Returns the best bid price level, if available.
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.best()
    }

    /// Returns the best ask price level, if available.
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.best()
    }

    /// Returns the spread between best ask and best bid.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Returns true if the top bid is at or above the top ask. Such a book is
    /// stale or mid-update and must not be traded against.
    pub fn is_crossed(&self) -> bool {
        matches!(self.spread(), Some(spread) if spread <= Decimal::ZERO)
    }
}
