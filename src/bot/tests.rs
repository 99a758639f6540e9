use super::*;
use crate::config::ExchangeConfig;
use crate::domain::{Order, OrderSide, PriceLevel};
use crate::exchanges::{
    Capabilities, Exchange, ExchangeError, MarketDataFeed, PaperExchange, PaperFeed,
};
use crate::notification::{EventType, NotificationError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn test_config(journal: Option<&std::path::Path>) -> Config {
    let storage = match journal {
        Some(path) => format!("storage:\n  enabled: true\n  path: \"{}\"\n", path.display()),
        None => String::new(),
    };
    let yaml = format!(
        r#"
app:
  name: bricklayer-test
  env: development
exchanges:
  alpha:
    enabled: true
    kind: paper
    fee_taker: "0.001"
    paper:
      base_balance: "0"
      quote_balance: "1000"
  beta:
    enabled: true
    kind: paper
    fee_taker: "0.001"
    paper:
      base_balance: "1"
      quote_balance: "0"
arbitrage:
  pair: BTC/USDT
  first_venue: alpha
  second_venue: beta
  first_to_second_profit_limit: "0.01"
  second_to_first_profit_limit: "0.01"
  tick_interval: 10ms
risk:
  min_trade_size_quote: "10"
execution:
  settle_delay: 1ms
  retry_delays: ["1ms"]
  startup_delay: 10ms
  error_backoff: 1h
{}"#,
        storage
    );
    serde_yaml::from_str(&yaml).unwrap()
}

fn book(ask: &str, bid: &str) -> BookDelta {
    BookDelta::snapshot(
        vec![PriceLevel::new(d(ask), d("1"))],
        vec![PriceLevel::new(d(bid), d("1"))],
    )
}

/// Registry that hands out prepared venues by name.
fn registry(venues: HashMap<String, VenueHandle>) -> VenueRegistry {
    let mut registry = VenueRegistry::new();
    registry.register(
        "paper",
        Box::new(move |name: &str, _config: &ExchangeConfig, _pair: &str| {
            venues
                .get(name)
                .cloned()
                .ok_or_else(|| ExchangeError::Internal(format!("no venue {}", name)))
        }),
    );
    registry
}

fn handle(exchange: Arc<dyn Exchange>, feed: &Arc<PaperFeed>) -> VenueHandle {
    let feed: Arc<dyn MarketDataFeed> = feed.clone();
    VenueHandle { exchange, feed }
}

async fn wait_until<F>(bot: &Bot, condition: F)
where
    F: Fn(&Stats) -> bool,
{
    for _ in 0..500 {
        if condition(&bot.stats().await) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached, stats: {:?}", bot.stats().await);
}

/// Notifier that records every event.
#[derive(Default)]
struct RecordingNotifier {
    events: std::sync::Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    fn types(&self) -> Vec<EventType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, event: &Event) -> Result<(), NotificationError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn send_async(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn is_enabled(&self, _event_type: EventType) -> bool {
        true
    }

    async fn close(&self) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// Venue with funds whose order placement always fails. Can drop cancel support.
struct BrokenExchange {
    capabilities: Capabilities,
}

#[async_trait]
impl Exchange for BrokenExchange {
    fn name(&self) -> &str {
        "alpha"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn fetch_balance(&self) -> crate::exchanges::Result<HashMap<String, Decimal>> {
        Ok(HashMap::from([("USDT".to_string(), d("1000"))]))
    }

    async fn fetch_open_orders(&self, _pair: &str) -> crate::exchanges::Result<Vec<Order>> {
        Ok(Vec::new())
    }

    async fn create_limit_order(
        &self,
        _side: OrderSide,
        _pair: &str,
        _amount: Decimal,
        _price: Decimal,
    ) -> crate::exchanges::Result<Order> {
        Err(ExchangeError::Api("order rejected".into()))
    }

    async fn fetch_order(&self, order_id: &str, _pair: &str) -> crate::exchanges::Result<Order> {
        Err(ExchangeError::OrderNotFound(order_id.to_string()))
    }

    async fn cancel_order(&self, _order_id: &str, _pair: &str) -> crate::exchanges::Result<()> {
        Err(ExchangeError::Api("cancel not offered".into()))
    }
}

#[tokio::test]
async fn test_paper_round_trip_is_executed_once() {
    let dir = tempfile::tempdir().unwrap();
    let journal = dir.path().join("journal.db");

    let alpha = Arc::new(PaperExchange::new("alpha", "BTC/USDT", d("0"), d("1000")));
    let beta = Arc::new(PaperExchange::new("beta", "BTC/USDT", d("1"), d("0")));
    let alpha_feed = Arc::new(PaperFeed::new());
    let beta_feed = Arc::new(PaperFeed::new());
    alpha_feed.push(book("100", "99")).await;
    beta_feed.push(book("104", "103")).await;

    let registry = registry(HashMap::from([
        ("alpha".to_string(), handle(alpha.clone(), &alpha_feed)),
        ("beta".to_string(), handle(beta.clone(), &beta_feed)),
    ]));
    let bot = Arc::new(
        Bot::new(BotConfig::new(test_config(Some(&journal))), &registry)
            .await
            .unwrap(),
    );
    assert!(bot.is_dry_run());

    let runner = {
        let bot = Arc::clone(&bot);
        tokio::spawn(async move { bot.start().await })
    };

    wait_until(&bot, |stats| stats.completed == 1).await;
    assert!(matches!(bot.start().await, Err(BotError::AlreadyRunning)));

    // The sell venue has no base left, so later ticks reject.
    let cycles = bot.stats().await.detection_cycles;
    wait_until(&bot, |stats| stats.detection_cycles >= cycles + 3).await;

    bot.stop().await.unwrap();
    runner.await.unwrap().unwrap();

    let stats = bot.stats().await;
    assert_eq!(stats.executions, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.total_profit, d("2.8"));

    let bought = alpha.orders().await;
    assert_eq!(bought.len(), 1);
    assert_eq!(bought[0].side, OrderSide::Buy);
    assert_eq!(bought[0].price, d("100"));
    let sold = beta.orders().await;
    assert_eq!(sold.len(), 1);
    assert_eq!(sold[0].price, d("103"));

    let restarted = Bot::new(BotConfig::new(test_config(Some(&journal))), &registry)
        .await
        .unwrap();
    let summary = restarted.journal_summary().await.unwrap().unwrap();
    assert_eq!(summary.total, 1);
    let last = summary.last.unwrap();
    assert_eq!(last.outcome, crate::arbitrage::ExecutionOutcome::Completed);
    assert_eq!(last.bought, d("1"));
    assert_eq!(last.sell_price, Some(d("103")));
}

#[tokio::test]
async fn test_failed_trade_notifies_and_backs_off() {
    let alpha: Arc<dyn Exchange> = Arc::new(BrokenExchange {
        capabilities: Capabilities::ALL,
    });
    let beta = Arc::new(PaperExchange::new("beta", "BTC/USDT", d("1"), d("0")));
    let alpha_feed = Arc::new(PaperFeed::new());
    let beta_feed = Arc::new(PaperFeed::new());
    alpha_feed.push(book("100", "99")).await;
    beta_feed.push(book("104", "103")).await;

    let registry = registry(HashMap::from([
        ("alpha".to_string(), handle(alpha, &alpha_feed)),
        ("beta".to_string(), handle(beta.clone(), &beta_feed)),
    ]));
    let notifier = Arc::new(RecordingNotifier::default());
    let mut config = BotConfig::new(test_config(None));
    config.notifier = Some(notifier.clone());
    let bot = Arc::new(Bot::new(config, &registry).await.unwrap());

    let runner = {
        let bot = Arc::clone(&bot);
        tokio::spawn(async move { bot.start().await })
    };

    wait_until(&bot, |stats| stats.failed == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Paused for an hour: no further cycles.
    let stats = bot.stats().await;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.executions, 0);
    assert_eq!(stats.detection_cycles, 1);
    assert!(beta.orders().await.is_empty());

    bot.stop().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("stop interrupts the backoff")
        .unwrap()
        .unwrap();

    let types = notifier.types();
    assert!(types.contains(&EventType::Startup));
    assert!(types.contains(&EventType::Opportunity));
    assert!(types.contains(&EventType::Error));
    assert!(types.contains(&EventType::Shutdown));
    assert!(!types.contains(&EventType::Execution));
}

#[tokio::test]
async fn test_missing_capability_fails_startup() {
    let alpha: Arc<dyn Exchange> = Arc::new(BrokenExchange {
        capabilities: Capabilities {
            cancel_order: false,
            ..Capabilities::ALL
        },
    });
    let beta: Arc<dyn Exchange> = Arc::new(PaperExchange::new("beta", "BTC/USDT", d("1"), d("0")));
    let feed = Arc::new(PaperFeed::new());
    let registry = registry(HashMap::from([
        ("alpha".to_string(), handle(alpha, &feed)),
        ("beta".to_string(), handle(beta, &feed)),
    ]));

    match Bot::new(BotConfig::new(test_config(None)), &registry).await {
        Err(BotError::MissingCapability { venue, missing }) => {
            assert_eq!(venue, "alpha");
            assert_eq!(missing, vec!["cancel_order"]);
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("bot built with a venue that cannot cancel"),
    }
}

#[tokio::test]
async fn test_unknown_venue_kind_fails_startup() {
    let mut config = test_config(None);
    if let Some(alpha) = config.exchanges.get_mut("alpha") {
        alpha.kind = Some("nowhere".to_string());
    }

    let result = Bot::new(BotConfig::new(config), &VenueRegistry::default()).await;
    assert!(matches!(result, Err(BotError::Exchange(ExchangeError::Internal(_)))));
}

#[tokio::test]
async fn test_stop_without_start() {
    let bot = Bot::new(BotConfig::new(test_config(None)), &VenueRegistry::default())
        .await
        .unwrap();
    assert!(bot.journal_summary().await.unwrap().is_none());
    assert!(!bot.is_running());
    bot.stop().await.unwrap();
    assert_eq!(bot.uptime().await, Duration::ZERO);
}

fn seed(config: &mut Config, venue: &str, ask: &str, bid: &str) {
    let paper = config
        .exchanges
        .get_mut(venue)
        .and_then(|v| v.paper.as_mut())
        .unwrap();
    paper.asks = vec![[ask.to_string(), "1".to_string()]];
    paper.bids = vec![[bid.to_string(), "1".to_string()]];
}

#[tokio::test]
async fn test_builtin_paper_venues_trade_seeded_books() {
    let mut config = test_config(None);
    seed(&mut config, "alpha", "100", "99");
    seed(&mut config, "beta", "104", "103");

    let bot = Arc::new(
        Bot::new(BotConfig::new(config), &VenueRegistry::default())
            .await
            .unwrap(),
    );
    let runner = {
        let bot = Arc::clone(&bot);
        tokio::spawn(async move { bot.start().await })
    };

    wait_until(&bot, |stats| stats.completed == 1).await;
    bot.stop().await.unwrap();
    runner.await.unwrap().unwrap();

    let stats = bot.stats().await;
    assert_eq!(stats.executions, 1);
    assert_eq!(stats.total_profit, d("2.8"));
}

#[test]
fn test_sample_config_seeds_a_premium() {
    let config = Config::load("configs/config.yaml").unwrap();
    let books: Vec<crate::domain::Orderbook> = ["alpha", "beta"]
        .iter()
        .map(|name| {
            let mut book = crate::domain::Orderbook::new(*name);
            let seed = config.exchanges[*name].paper.as_ref().and_then(|p| p.book());
            book.apply(&seed.unwrap());
            book
        })
        .collect();

    let ask = books[0].best_ask().unwrap().price;
    let bid = books[1].best_bid().unwrap().price;
    assert!(ask < bid, "alpha ask {} not below beta bid {}", ask, bid);
    assert!(!books[0].is_crossed() && !books[1].is_crossed());
}

/// Feed whose subscription always fails.
struct DeadFeed;

#[async_trait]
impl MarketDataFeed for DeadFeed {
    async fn subscribe(
        &self,
        _pair: &str,
    ) -> crate::exchanges::Result<tokio::sync::mpsc::UnboundedReceiver<BookDelta>> {
        Err(ExchangeError::Api("stream refused".into()))
    }
}

#[tokio::test]
async fn test_failed_subscription_aborts_start() {
    let alpha = Arc::new(PaperExchange::new("alpha", "BTC/USDT", d("0"), d("1000")));
    let beta = Arc::new(PaperExchange::new("beta", "BTC/USDT", d("1"), d("0")));
    let alpha_feed = Arc::new(PaperFeed::new());
    let beta_handle = VenueHandle {
        exchange: beta,
        feed: Arc::new(DeadFeed),
    };

    let registry = registry(HashMap::from([
        ("alpha".to_string(), handle(alpha, &alpha_feed)),
        ("beta".to_string(), beta_handle),
    ]));
    let bot = Bot::new(BotConfig::new(test_config(None)), &registry)
        .await
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), bot.start())
        .await
        .expect("start returns once a subscription fails");
    assert!(matches!(result, Err(BotError::Exchange(ExchangeError::Api(_)))));
    assert!(!bot.is_running());
    assert_eq!(bot.stats().await.detection_cycles, 0);
}
