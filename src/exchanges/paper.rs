//! Simulated venue for dry runs.
//!
//! `PaperExchange` keeps an in-memory account and fills every limit order the
//! moment it is placed. `PaperFeed` replays its latest snapshot to each
//! subscriber and forwards whatever is pushed into it afterwards.

use super::{Capabilities, Exchange, ExchangeError, MarketDataFeed, Result};
use crate::domain::{BookDelta, Order, OrderSide, OrderStatus};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

/// In-memory account that fills limit orders immediately.
pub struct PaperExchange {
    name: String,
    pair: String,
    base: String,
    quote: String,
    balances: Mutex<HashMap<String, Decimal>>,
    orders: Mutex<HashMap<String, Order>>,
    next_id: AtomicU64,
}

impl PaperExchange {
    pub fn new(
        name: impl Into<String>,
        pair: &str,
        base_balance: Decimal,
        quote_balance: Decimal,
    ) -> Self {
        let mut coins = pair.split('/');
        let base = coins.next().unwrap_or_default().to_string();
        let quote = coins.next().unwrap_or_default().to_string();

        let balances = HashMap::from([
            (base.clone(), base_balance),
            (quote.clone(), quote_balance),
        ]);

        Self {
            name: name.into(),
            pair: pair.to_string(),
            base,
            quote,
            balances: Mutex::new(balances),
            orders: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Orders placed so far, in placement order.
    #[cfg(test)]
    pub async fn orders(&self) -> Vec<Order> {
        let orders = self.orders.lock().await;
        let mut list: Vec<Order> = orders.values().cloned().collect();
        list.sort_by_key(|o| o.created_at);
        list
    }

    fn check_pair(&self, pair: &str) -> Result<()> {
        if pair != self.pair {
            return Err(ExchangeError::PairNotSupported(pair.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    async fn fetch_balance(&self) -> Result<HashMap<String, Decimal>> {
        Ok(self.balances.lock().await.clone())
    }

    async fn fetch_open_orders(&self, pair: &str) -> Result<Vec<Order>> {
        self.check_pair(pair)?;
        // Orders fill on placement, nothing ever rests.
        Ok(Vec::new())
    }

    async fn create_limit_order(
        &self,
        side: OrderSide,
        pair: &str,
        amount: Decimal,
        price: Decimal,
    ) -> Result<Order> {
        self.check_pair(pair)?;
        if amount <= Decimal::ZERO || price <= Decimal::ZERO {
            return Err(ExchangeError::Api(format!(
                "invalid order amount {} at price {}",
                amount, price
            )));
        }

        let cost = amount * price;
        {
            let mut balances = self.balances.lock().await;
            let (pay_asset, pay, get_asset, get) = match side {
                OrderSide::Buy => (&self.quote, cost, &self.base, amount),
                OrderSide::Sell => (&self.base, amount, &self.quote, cost),
            };

            let available = balances.get(pay_asset).copied().unwrap_or_default();
            if available < pay {
                return Err(ExchangeError::InsufficientFunds(format!(
                    "{} {} needed, {} available",
                    pay, pay_asset, available
                )));
            }

            balances.insert(pay_asset.clone(), available - pay);
            *balances.entry(get_asset.clone()).or_default() += get;
        }

        let id = format!("paper-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let order = Order {
            id: id.clone(),
            exchange: self.name.clone(),
            pair: pair.to_string(),
            side,
            price,
            amount,
            filled: amount,
            remaining: Decimal::ZERO,
            status: Some(OrderStatus::Closed),
            created_at: SystemTime::now(),
        };

        info!(
            exchange = %self.name,
            order_id = %id,
            side = %side,
            amount = %amount,
            price = %price,
            "Paper order filled"
        );

        self.orders.lock().await.insert(id, order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &str, pair: &str) -> Result<Order> {
        self.check_pair(pair)?;
        self.orders
            .lock()
            .await
            .get(order_id)
            .cloned()
            .ok_or_else(|| ExchangeError::OrderNotFound(order_id.to_string()))
    }

    async fn cancel_order(&self, order_id: &str, pair: &str) -> Result<()> {
        self.check_pair(pair)?;
        // Filled orders cannot be cancelled.
        match self.orders.lock().await.get(order_id) {
            Some(_) => Err(ExchangeError::Api(format!(
                "order {} is already closed",
                order_id
            ))),
            None => Err(ExchangeError::OrderNotFound(order_id.to_string())),
        }
    }
}

/// Feed whose deltas are pushed by the caller.
#[derive(Default)]
pub struct PaperFeed {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<BookDelta>>>,
    last_snapshot: Mutex<Option<BookDelta>>,
}

impl PaperFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a feed whose subscribers start from `snapshot`.
    pub fn with_snapshot(snapshot: BookDelta) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            last_snapshot: Mutex::new(Some(snapshot)),
        }
    }

    /// Sends a delta to every live subscriber. Returns how many received it.
    #[cfg(test)]
    pub async fn push(&self, delta: BookDelta) -> usize {
        if delta.full {
            *self.last_snapshot.lock().await = Some(delta.clone());
        }

        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|tx| tx.send(delta.clone()).is_ok());
        debug!(subscribers = subscribers.len(), full = delta.full, "Paper delta pushed");
        subscribers.len()
    }
}

#[async_trait]
impl MarketDataFeed for PaperFeed {
    async fn subscribe(&self, pair: &str) -> Result<mpsc::UnboundedReceiver<BookDelta>> {
        let (tx, rx) = mpsc::unbounded_channel();

        // Late subscribers start from the latest snapshot.
        let snapshot = self.last_snapshot.lock().await.clone();
        debug!(pair = %pair, replayed = snapshot.is_some(), "Paper feed subscribed");
        if let Some(snapshot) = snapshot {
            let _ = tx.send(snapshot);
        }

        self.subscribers.lock().await.push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceLevel;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn exchange() -> PaperExchange {
        PaperExchange::new("paper", "BTC/USDT", d("1"), d("1000"))
    }

    #[tokio::test]
    async fn test_buy_fills_and_moves_balances() {
        let ex = exchange();
        let order = ex
            .create_limit_order(OrderSide::Buy, "BTC/USDT", d("0.5"), d("100"))
            .await
            .unwrap();

        assert!(order.is_closed());
        assert_eq!(order.filled, d("0.5"));
        assert_eq!(order.remaining, Decimal::ZERO);

        let balances = ex.fetch_balance().await.unwrap();
        assert_eq!(balances["BTC"], d("1.5"));
        assert_eq!(balances["USDT"], d("950"));
    }

    #[tokio::test]
    async fn test_sell_without_base_fails() {
        let ex = exchange();
        let result = ex
            .create_limit_order(OrderSide::Sell, "BTC/USDT", d("2"), d("100"))
            .await;
        assert!(matches!(result, Err(ExchangeError::InsufficientFunds(_))));

        let balances = ex.fetch_balance().await.unwrap();
        assert_eq!(balances["BTC"], d("1"));
    }

    #[tokio::test]
    async fn test_other_pair_rejected() {
        let ex = exchange();
        let result = ex.fetch_open_orders("ETH/USDT").await;
        assert!(matches!(result, Err(ExchangeError::PairNotSupported(_))));
    }

    #[tokio::test]
    async fn test_fetch_order_after_fill() {
        let ex = exchange();
        let order = ex
            .create_limit_order(OrderSide::Sell, "BTC/USDT", d("0.1"), d("100"))
            .await
            .unwrap();

        let fetched = ex.fetch_order(&order.id, "BTC/USDT").await.unwrap();
        assert!(fetched.is_closed());
        assert!(ex.fetch_open_orders("BTC/USDT").await.unwrap().is_empty());
        assert!(matches!(
            ex.fetch_order("missing", "BTC/USDT").await,
            Err(ExchangeError::OrderNotFound(_))
        ));
        assert_eq!(ex.orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_feed_replays_snapshot_to_late_subscriber() {
        let feed = PaperFeed::new();
        let snapshot = BookDelta::snapshot(
            vec![PriceLevel::new(d("101"), d("1"))],
            vec![PriceLevel::new(d("100"), d("1"))],
        );
        assert_eq!(feed.push(snapshot.clone()).await, 0);

        let mut rx = feed.subscribe("BTC/USDT").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), snapshot);

        let update = BookDelta::update(vec![PriceLevel::new(d("101"), Decimal::ZERO)], vec![]);
        assert_eq!(feed.push(update.clone()).await, 1);
        assert_eq!(rx.recv().await.unwrap(), update);
    }

    #[tokio::test]
    async fn test_seeded_feed_serves_snapshot_on_subscribe() {
        let snapshot = BookDelta::snapshot(vec![PriceLevel::new(d("101"), d("1"))], vec![]);
        let feed = PaperFeed::with_snapshot(snapshot.clone());

        let mut first = feed.subscribe("BTC/USDT").await.unwrap();
        let mut second = feed.subscribe("BTC/USDT").await.unwrap();
        assert_eq!(first.recv().await.unwrap(), snapshot);
        assert_eq!(second.recv().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_feed_drops_closed_subscribers() {
        let feed = PaperFeed::new();
        let rx = feed.subscribe("BTC/USDT").await.unwrap();
        drop(rx);

        assert_eq!(feed.push(BookDelta::update(vec![], vec![])).await, 0);
    }
}
