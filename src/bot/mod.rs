//! Main arbitrage bot implementation.
//!
//! Wires the venues, book store, balance tracker, detector and executor
//! together and runs the trading, refresh and overview loops.

mod config;
mod error;
mod stats;

pub use config::BotConfig;
pub use error::BotError;
pub use stats::Stats;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::arbitrage::{
    ExecutionCoordinator, ExecutionReport, FeeModel, OpportunityDetector,
    OrderBookStore, RiskLimiter,
};
use crate::balance::BalanceTracker;
use crate::config::{Config, ConfigError, ExecutionConfig};
use crate::domain::{BookDelta, Direction, Opportunity, VenueSlot};
use crate::exchanges::{VenueHandle, VenueRegistry};
use crate::notification::{
    ErrorData, Event, ExecutionData, MultiNotifier, NoopNotifier, Notifier, OpportunityData,
    OverviewData, ShutdownData, StartupData, TelegramConfig, TelegramNotifier,
};
use crate::storage::{ExecutionRecord, ExecutionStorage, SqliteStorage, SqliteStorageConfig};

const DEFAULT_OVERVIEW_INTERVAL: Duration = Duration::from_secs(3600);

/// What the execution journal held when the bot started.
#[derive(Debug, Clone)]
pub struct JournalSummary {
    /// Executions of all pairs.
    pub total: i64,
    /// Latest execution of the traded pair.
    pub last: Option<ExecutionRecord>,
}

/// Main arbitrage bot that coordinates all components.
pub struct Bot {
    cfg: Config,
    pair: String,
    venues: [VenueHandle; 2],
    books: Arc<OrderBookStore>,
    balances: BalanceTracker,
    detector: OpportunityDetector,
    executor: ExecutionCoordinator,
    storage: Option<Arc<dyn ExecutionStorage>>,
    notifier: Arc<dyn Notifier>,
    execution: ExecutionConfig,

    // Held for a whole execution sequence and for every balance refresh.
    trading_lock: Mutex<()>,

    // Runtime state
    version: String,
    build_time: String,
    dry_run: bool,
    started_at: Mutex<Option<Instant>>,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    stats: Mutex<Stats>,
}

impl Bot {
    /// Creates a new Bot instance, resolving both venues through `registry`.
    ///
    /// Fails if a venue cannot be built or lacks a required operation.
    pub async fn new(cfg: BotConfig, registry: &VenueRegistry) -> Result<Self, BotError> {
        let app = cfg.app_config;
        let arb = &app.arbitrage;
        let pair = arb.pair.clone();
        let [first, second] = app.venue_names();

        let venues = [
            resolve_venue(&app, registry, &first, &pair)?,
            resolve_venue(&app, registry, &second, &pair)?,
        ];
        let exchanges = [
            Arc::clone(&venues[0].exchange),
            Arc::clone(&venues[1].exchange),
        ];

        let notifier = match cfg.notifier {
            Some(notifier) => notifier,
            None => build_notifier(&app),
        };

        let storage: Option<Arc<dyn ExecutionStorage>> =
            match app.storage.as_ref().filter(|s| s.enabled) {
                Some(settings) => {
                    let config = SqliteStorageConfig {
                        path: settings.journal_path().to_string(),
                        max_connections: settings.max_connections(),
                    };
                    Some(Arc::new(SqliteStorage::new(config).await?) as Arc<dyn ExecutionStorage>)
                }
                None => None,
            };

        let fees = FeeModel::new(
            app.venue(&first).map(|v| v.fees()).unwrap_or_default(),
            app.venue(&second).map(|v| v.fees()).unwrap_or_default(),
            arb.base_coin_notional(),
            arb.bisect_across_venues,
        );
        let risk = RiskLimiter::from_config(&app.risk());
        let execution = app.execution();
        let balance = app.balance();

        let detector = OpportunityDetector::new(
            pair.clone(),
            fees.clone(),
            risk.clone(),
            [
                arb.profit_limit(Direction::FirstToSecond),
                arb.profit_limit(Direction::SecondToFirst),
            ],
            arb.max_levels(),
            arb.enable_cross_venue_transfer,
        );
        let executor =
            ExecutionCoordinator::new(exchanges.clone(), pair.clone(), fees, risk, &execution);
        let balances = BalanceTracker::new(
            exchanges,
            &pair,
            [arb.base_coin(), arb.quote_coin()],
            Arc::clone(&notifier),
        )
            .with_thresholds(balance.base_alert_threshold(), balance.quote_alert_threshold())
            .with_name(app.app.name.clone());

        let (shutdown, _) = watch::channel(false);

        Ok(Bot {
            books: Arc::new(OrderBookStore::new(&first, &second)),
            pair,
            venues,
            balances,
            detector,
            executor,
            storage,
            notifier,
            execution,
            trading_lock: Mutex::new(()),
            version: cfg.version,
            build_time: cfg.build_time,
            dry_run: cfg.dry_run,
            started_at: Mutex::new(None),
            running: AtomicBool::new(false),
            shutdown,
            stats: Mutex::new(Stats::default()),
            cfg: app,
        })
    }

    /// Starts the bot and runs until `stop` is called.
    ///
    /// Refreshes balances, subscribes to both feeds and waits for the books
    /// to fill before the first tick.
    pub async fn start(&self) -> Result<(), BotError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(BotError::AlreadyRunning);
        }
        self.shutdown.send_replace(false);
        *self.started_at.lock().await = Some(Instant::now());

        let exchanges: Vec<String> = self
            .venues
            .iter()
            .map(|v| v.exchange.name().to_string())
            .collect();

        info!(
            version = %self.version,
            build_time = %self.build_time,
            dry_run = self.dry_run,
            exchanges = ?exchanges,
            pair = %self.pair,
            "Starting arbitrage bot"
        );

        self.send_notification(Event::new(StartupData {
            version: self.version.clone(),
            exchanges,
            pair: self.pair.clone(),
            dry_run: self.dry_run,
        }))
        .await;

        {
            let _guard = self.trading_lock.lock().await;
            self.balances.refresh().await;
        }
        self.balances.check_alerts().await;

        match self.journal_summary().await {
            Ok(Some(summary)) => {
                let last = summary.last.map(|record| record.to_string());
                info!(total = summary.total, last = ?last, "Execution journal opened");
            }
            Ok(None) => debug!("Execution journal disabled"),
            Err(e) => warn!(error = %e, "Failed to read execution journal"),
        }

        let pumps = match self.subscribe_feeds().await {
            Ok(pumps) => pumps,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let startup_delay = self.execution.startup_delay();
        info!(delay = ?startup_delay, "Waiting for order books");
        if self.pause(startup_delay).await {
            tokio::join!(
                self.run_trading_loop(),
                self.run_refresh_loop(),
                self.run_overview_loop()
            );
        }

        for pump in pumps {
            pump.abort();
        }

        if let Some(ref storage) = self.storage {
            storage.close().await?;
        }

        Ok(())
    }

    /// Gracefully stops the bot. Sleeping loops wake up immediately.
    pub async fn stop(&self) -> Result<(), BotError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.shutdown.send_replace(true);

        info!("Stopping bot...");

        let uptime = self.uptime().await;

        self.send_notification(Event::new(ShutdownData {
            reason: "graceful shutdown".to_string(),
            uptime,
            graceful: true,
        }))
        .await;

        if let Err(e) = self.notifier.close().await {
            debug!(error = %e, "Failed to close notifier");
        }

        info!(uptime = ?uptime, "Bot stopped");

        Ok(())
    }

    /// Returns a copy of the current statistics.
    pub async fn stats(&self) -> Stats {
        self.stats.lock().await.clone()
    }

    /// Reads the journal size and the latest execution of the pair. None
    /// when journaling is disabled.
    pub async fn journal_summary(&self) -> Result<Option<JournalSummary>, BotError> {
        let Some(ref storage) = self.storage else {
            return Ok(None);
        };
        let total = storage.count().await?;
        let last = storage.recent(&self.pair, 1).await?.into_iter().next();
        Ok(Some(JournalSummary { total, last }))
    }

    /// Returns true if the bot is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns how long the bot has been running.
    pub async fn uptime(&self) -> Duration {
        self.started_at
            .lock()
            .await
            .map(|s| s.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Sleeps for `duration`. Returns false if the bot was stopped meanwhile.
    async fn pause(&self, duration: Duration) -> bool {
        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_running(),
            _ = shutdown.wait_for(|stop| *stop) => false,
        }
    }

    /// Subscribes to both feeds and spawns a task per venue that applies
    /// deltas to the book store.
    async fn subscribe_feeds(&self) -> Result<Vec<JoinHandle<()>>, BotError> {
        let mut pumps: Vec<JoinHandle<()>> = Vec::with_capacity(2);

        for slot in VenueSlot::ALL {
            let venue = &self.venues[slot.index()];
            let rx = match venue.feed.subscribe(&self.pair).await {
                Ok(rx) => rx,
                Err(e) => {
                    for pump in &pumps {
                        pump.abort();
                    }
                    return Err(e.into());
                }
            };

            info!(exchange = %venue.exchange.name(), pair = %self.pair, "Subscribed to order book");
            pumps.push(tokio::spawn(pump_feed(
                slot,
                venue.exchange.name().to_string(),
                rx,
                Arc::clone(&self.books),
            )));
        }

        Ok(pumps)
    }

    /// Evaluates both directions every tick. A failed trading attempt pauses
    /// the loop for the error backoff.
    async fn run_trading_loop(&self) {
        let tick_interval = self.cfg.arbitrage.tick_interval();
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.subscribe();

        info!(
            tick_interval = ?tick_interval,
            error_backoff = ?self.execution.error_backoff(),
            "Starting trading loop"
        );

        while self.is_running() {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
            if !self.is_running() {
                break;
            }

            if let Err(e) = self.tick().await {
                let backoff = self.execution.error_backoff();
                error!(pair = %self.pair, error = %e, backoff = ?backoff, "Trading attempt failed, pausing");
                self.stats.lock().await.failed += 1;
                self.send_notification(Event::new(ErrorData {
                    component: "trading".to_string(),
                    message: format!("{}: trading paused for {:?}", self.cfg.app.name, backoff),
                    error: Some(e.to_string()),
                }))
                .await;

                if !self.pause(backoff).await {
                    break;
                }
            }
        }

        debug!("Trading loop stopped");
    }

    /// Runs one detection cycle over both directions.
    async fn tick(&self) -> Result<(), BotError> {
        let cycles = {
            let mut stats = self.stats.lock().await;
            stats.detection_cycles += 1;
            stats.detection_cycles
        };

        if cycles % 60 == 1 {
            info!(cycle = cycles, pair = %self.pair, "Detection cycle running");
        }

        for direction in Direction::ALL {
            let buy = direction.buy_slot();
            let sell = direction.sell_slot();
            let buy_book = self.books.snapshot(buy).await;
            let sell_book = self.books.snapshot(sell).await;
            let states = self.balances.states().await;

            let opp = match self.detector.evaluate(
                direction,
                &buy_book,
                &sell_book,
                &states[buy.index()],
                &states[sell.index()],
            ) {
                Ok(opp) => opp,
                Err(rejection) => {
                    debug!(direction = %direction, reason = %rejection, "No trade");
                    continue;
                }
            };

            self.stats.lock().await.opportunities_detected += 1;
            self.notifier.send_async(Event::new(OpportunityData {
                pair: opp.pair.clone(),
                buy_exchange: opp.buy_exchange.clone(),
                sell_exchange: opp.sell_exchange.clone(),
                buy_price: opp.ask.price,
                sell_price: opp.bid.price,
                profit_percent: opp.pure_profit * rust_decimal::Decimal::ONE_HUNDRED,
                quantity: opp.quantity,
            }));

            let report = self.execute(&opp).await?;
            self.record(&report).await;
        }

        Ok(())
    }

    /// Executes under the trading lock and refreshes balances afterwards,
    /// also when the sequence failed.
    async fn execute(&self, opp: &Opportunity) -> Result<ExecutionReport, BotError> {
        let _guard = self.trading_lock.lock().await;
        let result = self.executor.execute(opp).await;
        self.balances.refresh().await;
        Ok(result?)
    }

    async fn record(&self, report: &ExecutionReport) {
        self.stats.lock().await.record(report);

        info!(
            pair = %report.pair,
            direction = %report.direction,
            outcome = %report.outcome,
            bought = %report.buy.filled,
            estimated_profit = %report.estimated_profit,
            elapsed = ?report.elapsed,
            "Execution finished"
        );
        if !report.outcome.hedged() && !report.buy.filled.is_zero() {
            warn!(
                exchange = %report.buy_exchange,
                amount = %report.buy.filled,
                "Bought amount left without a sell"
            );
        }

        self.notifier.send_async(Event::new(ExecutionData::from(report)));

        if let Some(ref storage) = self.storage {
            if let Err(e) = storage.save(report).await {
                warn!(error = %e, "Failed to journal execution");
            }
        }
    }

    /// Refreshes balances and open orders and raises low-balance alerts.
    async fn run_refresh_loop(&self) {
        let period = self.cfg.balance().refresh_interval();
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.subscribe();

        while self.is_running() {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }

            let _guard = self.trading_lock.lock().await;
            self.balances.refresh().await;
            let alerts = self.balances.check_alerts().await;
            debug!(alerts, "Periodic balance refresh done");
        }
    }

    async fn run_overview_loop(&self) {
        let period = self
            .cfg
            .notification
            .as_ref()
            .map(|n| n.overview_interval())
            .unwrap_or(DEFAULT_OVERVIEW_INTERVAL);
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let mut shutdown = self.shutdown.subscribe();

        while self.is_running() {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
            self.send_overview().await;
        }
    }

    /// Sends a notification event and waits for delivery.
    async fn send_notification(&self, event: Event) {
        if let Err(e) = self.notifier.send(&event).await {
            debug!(
                event_type = %event.event_type,
                error = %e,
                "Failed to send notification"
            );
        }
    }

    /// Sends a periodic overview notification with current stats.
    async fn send_overview(&self) {
        let stats = self.stats().await;
        let uptime = self.uptime().await;

        self.send_notification(Event::new(OverviewData {
            uptime,
            detection_cycles: stats.detection_cycles,
            opportunities_detected: stats.opportunities_detected,
            executions: stats.executions,
            completed: stats.completed,
            stop_losses: stats.stop_losses,
            failed: stats.failed,
            total_profit: stats.total_profit,
            dry_run: self.dry_run,
        }))
        .await;
    }
}

fn resolve_venue(
    config: &Config,
    registry: &VenueRegistry,
    name: &str,
    pair: &str,
) -> Result<VenueHandle, BotError> {
    let venue_config = config
        .venue(name)
        .ok_or_else(|| ConfigError::UnknownVenue(name.to_string()))?;
    let handle = registry.resolve(name, venue_config, pair)?;

    let missing = handle.exchange.capabilities().missing_required();
    if !missing.is_empty() {
        return Err(BotError::MissingCapability {
            venue: name.to_string(),
            missing,
        });
    }

    Ok(handle)
}

/// Builds the notifier from the notification settings.
fn build_notifier(config: &Config) -> Arc<dyn Notifier> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    if let Some(telegram) = config.notification.as_ref().and_then(|n| n.active_telegram()) {
        match TelegramNotifier::new(TelegramConfig::from_settings(telegram)) {
            Ok(notifier) => {
                notifiers.push(Arc::new(notifier));
                info!("Telegram notifier created");
            }
            Err(e) => {
                warn!(error = %e, "Failed to create Telegram notifier");
            }
        }
    }

    if notifiers.is_empty() {
        Arc::new(NoopNotifier::new())
    } else {
        Arc::new(MultiNotifier::new(notifiers))
    }
}

async fn pump_feed(
    slot: VenueSlot,
    exchange: String,
    mut rx: mpsc::UnboundedReceiver<BookDelta>,
    books: Arc<OrderBookStore>,
) {
    while let Some(delta) = rx.recv().await {
        books.apply(slot, &delta).await;
    }
    warn!(exchange = %exchange, "Order book feed closed");
}

#[cfg(test)]
mod tests;
