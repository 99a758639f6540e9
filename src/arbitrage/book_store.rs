//! Live order books of both venues.

use tokio::sync::RwLock;

use crate::domain::{BookDelta, Orderbook, VenueSlot};

/// Holds the order book of each venue. Feed pumps write here without the
/// trading lock; detection reads snapshots that may lag a concurrent update.
pub struct OrderBookStore {
    books: [RwLock<Orderbook>; 2],
}

impl OrderBookStore {
    pub fn new(first: &str, second: &str) -> Self {
        Self {
            books: [
                RwLock::new(Orderbook::new(first)),
                RwLock::new(Orderbook::new(second)),
            ],
        }
    }

    /// Applies a feed delta to the venue's book.
    pub async fn apply(&self, slot: VenueSlot, delta: &BookDelta) {
        self.books[slot.index()].write().await.apply(delta);
    }

    /// Returns a copy of the venue's book.
    pub async fn snapshot(&self, slot: VenueSlot) -> Orderbook {
        self.books[slot.index()].read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceLevel;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_books_are_independent() {
        let store = OrderBookStore::new("alpha", "beta");
        let delta = BookDelta::snapshot(
            vec![PriceLevel::new(Decimal::from(101), Decimal::ONE)],
            vec![PriceLevel::new(Decimal::from(100), Decimal::ONE)],
        );

        store.apply(VenueSlot::Second, &delta).await;

        let first = store.snapshot(VenueSlot::First).await;
        let second = store.snapshot(VenueSlot::Second).await;
        assert_eq!(first.exchange, "alpha");
        assert!(first.asks.is_empty());
        assert_eq!(second.exchange, "beta");
        assert_eq!(second.best_ask().unwrap().price, Decimal::from(101));
        assert_eq!(second.best_bid().unwrap().price, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_full_delta_replaces_book() {
        let store = OrderBookStore::new("alpha", "beta");
        store
            .apply(
                VenueSlot::First,
                &BookDelta::snapshot(vec![PriceLevel::new(Decimal::from(101), Decimal::ONE)], vec![]),
            )
            .await;
        store
            .apply(
                VenueSlot::First,
                &BookDelta::snapshot(vec![PriceLevel::new(Decimal::from(105), Decimal::ONE)], vec![]),
            )
            .await;

        let book = store.snapshot(VenueSlot::First).await;
        assert_eq!(book.asks.len(), 1);
        assert_eq!(book.best_ask().unwrap().price, Decimal::from(105));
    }
}
