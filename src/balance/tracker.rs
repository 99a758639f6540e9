//! Periodic balance and open order refresh.

use futures_util::future::join4;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::AlertLatch;
use crate::domain::VenueSlot;
use crate::exchanges::{Exchange, Result};
use crate::notification::{BalanceAlertData, Event, Notifier};

/// Last known account state of a venue.
///
/// Fields are overwritten on each successful refresh and keep their stale
/// values when a refresh fails.
#[derive(Debug, Clone, PartialEq)]
pub struct VenueState {
    pub name: String,
    /// Free base balance.
    pub base: Decimal,
    /// Free quote balance.
    pub quote: Decimal,
    pub open_orders: usize,
}

impl VenueState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: Decimal::ZERO,
            quote: Decimal::ZERO,
            open_orders: 0,
        }
    }
}

/// Asset index into the per-venue latch pair.
const BASE: usize = 0;
const QUOTE: usize = 1;

/// BalanceTracker caches balances and open order counts of both venues and
/// raises low-balance alerts.
pub struct BalanceTracker {
    venues: [Arc<dyn Exchange>; 2],
    pair: String,
    coins: [String; 2],
    thresholds: [Decimal; 2],
    bot_name: String,
    notifier: Arc<dyn Notifier>,
    states: RwLock<[VenueState; 2]>,
    latches: Mutex<[[AlertLatch; 2]; 2]>,
}

impl BalanceTracker {
    /// Tracks `pair` on both venues; `coins` holds its base and quote asset.
    pub fn new(
        venues: [Arc<dyn Exchange>; 2],
        pair: &str,
        coins: [&str; 2],
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let states = [
            VenueState::new(venues[0].name()),
            VenueState::new(venues[1].name()),
        ];

        Self {
            venues,
            pair: pair.to_string(),
            coins: coins.map(str::to_string),
            thresholds: [Decimal::ZERO; 2],
            bot_name: String::new(),
            notifier,
            states: RwLock::new(states),
            latches: Mutex::new([[AlertLatch::new(); 2]; 2]),
        }
    }

    /// Alert when free base or quote balance drops below these amounts.
    pub fn with_thresholds(mut self, base: Decimal, quote: Decimal) -> Self {
        self.thresholds = [base, quote];
        self
    }

    /// Name attached to alerts.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.bot_name = name.into();
        self
    }

    /// Returns the cached state of a venue.
    #[cfg(test)]
    pub async fn state(&self, slot: VenueSlot) -> VenueState {
        self.states.read().await[slot.index()].clone()
    }

    /// Returns the cached state of both venues.
    pub async fn states(&self) -> [VenueState; 2] {
        self.states.read().await.clone()
    }

    /// Fetches balances and open orders of both venues concurrently.
    /// Failures are logged and leave the previous values in place.
    pub async fn refresh(&self) {
        let [first, second] = &self.venues;
        let (first_balance, second_balance, first_orders, second_orders) = join4(
            first.fetch_balance(),
            second.fetch_balance(),
            first.fetch_open_orders(&self.pair),
            second.fetch_open_orders(&self.pair),
        )
        .await;

        let mut states = self.states.write().await;
        self.apply(&mut states[0], first_balance, first_orders.map(|o| o.len()));
        self.apply(&mut states[1], second_balance, second_orders.map(|o| o.len()));

        debug!(
            pair = %self.pair,
            first = %states[0].name,
            first_base = %states[0].base,
            first_quote = %states[0].quote,
            first_open_orders = states[0].open_orders,
            second = %states[1].name,
            second_base = %states[1].base,
            second_quote = %states[1].quote,
            second_open_orders = states[1].open_orders,
            "Balances refreshed"
        );
    }

    fn apply(
        &self,
        state: &mut VenueState,
        balance: Result<HashMap<String, Decimal>>,
        open_orders: Result<usize>,
    ) {
        match balance {
            Ok(balance) => {
                // Missing assets read as zero.
                state.base = balance.get(&self.coins[BASE]).copied().unwrap_or_default();
                state.quote = balance.get(&self.coins[QUOTE]).copied().unwrap_or_default();
            }
            Err(e) => warn!(exchange = %state.name, error = %e, "Failed to fetch balance"),
        }

        match open_orders {
            Ok(count) => state.open_orders = count,
            Err(e) => warn!(exchange = %state.name, error = %e, "Failed to fetch open orders"),
        }
    }

    /// Evaluates the four (venue, asset) latches against the cached balances
    /// and queues an alert for each newly crossed threshold.
    /// Returns the number of alerts raised.
    pub async fn check_alerts(&self) -> usize {
        let states = self.states().await;
        let mut latches = self.latches.lock().await;
        let mut raised = 0;

        for slot in VenueSlot::ALL {
            let state = &states[slot.index()];
            for (asset, balance) in [(BASE, state.base), (QUOTE, state.quote)] {
                let threshold = self.thresholds[asset];
                if !latches[slot.index()][asset].observe(balance, threshold) {
                    continue;
                }

                warn!(
                    exchange = %state.name,
                    asset = %self.coins[asset],
                    balance = %balance,
                    threshold = %threshold,
                    name = %self.bot_name,
                    "Balance below alert threshold"
                );
                self.notifier.send_async(Event::new(BalanceAlertData {
                    bot_name: self.bot_name.clone(),
                    exchange: state.name.clone(),
                    asset: self.coins[asset].clone(),
                    balance,
                    threshold,
                }));
                raised += 1;
            }
        }

        raised
    }
}
