//! Buy-then-sell execution of an accepted opportunity.
//!
//! The sequence is:
//! 1. buy at the ask, poll, cancel if still open;
//! 2. stop if nothing or too little was bought;
//! 3. sell the filled amount at the bid, poll, optionally cancel;
//! 4. if the sell did not close, leave one stop-loss sell resting for the
//!    remainder, priced to cover fees.
//!
//! Residual exposure after steps 2 and 4 is accepted, not corrected.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{FeeModel, MIN_FOLLOW_UP_RATIO, RiskLimiter};
use crate::config::ExecutionConfig;
use crate::domain::{Direction, Opportunity, Order, OrderSide, OrderStatus, VenueSlot};
use crate::exchanges::{Exchange, Result};

/// Delays between placing an order and checking its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSchedule {
    /// Wait after placement before the first check.
    pub settle_delay: Duration,
    /// Wait before each follow-up check. The order is cancelled (if allowed)
    /// when it is still open after the last one.
    pub retry_delays: Vec<Duration>,
}

impl PollSchedule {
    pub fn new(settle_delay: Duration, retry_delays: Vec<Duration>) -> Self {
        Self {
            settle_delay,
            retry_delays,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(config.settle_delay(), config.retry_delays())
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::from_config(&ExecutionConfig::default())
    }
}

/// Final known state of one order after polling.
#[derive(Debug, Clone, PartialEq)]
pub struct LegOutcome {
    pub order_id: String,
    pub price: Decimal,
    pub requested: Decimal,
    pub filled: Decimal,
    pub remaining: Decimal,
    /// The order is completely filled.
    pub closed: bool,
    /// The order was cancelled after the last poll.
    pub cancelled: bool,
}

/// Replacement sell left resting on the book.
#[derive(Debug, Clone, PartialEq)]
pub struct StopLossOrder {
    pub order_id: String,
    pub price: Decimal,
    pub amount: Decimal,
}

/// How an execution sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The buy leg filled nothing.
    NoFill,
    /// The buy leg filled too little to sell; the base amount stays on the buy venue.
    BuyBelowMinimum,
    /// Both legs closed.
    Completed,
    /// The sell leg left too little to place a stop-loss.
    SellBelowMinimum,
    /// The sell leg did not close and a stop-loss sell was left resting.
    StopLossPlaced,
}

impl ExecutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionOutcome::NoFill => "no_fill",
            ExecutionOutcome::BuyBelowMinimum => "buy_below_minimum",
            ExecutionOutcome::Completed => "completed",
            ExecutionOutcome::SellBelowMinimum => "sell_below_minimum",
            ExecutionOutcome::StopLossPlaced => "stop_loss_placed",
        }
    }

    /// Returns true if a sell was attempted against the buy.
    pub fn hedged(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::Completed
                | ExecutionOutcome::SellBelowMinimum
                | ExecutionOutcome::StopLossPlaced
        )
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionOutcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "no_fill" => Ok(ExecutionOutcome::NoFill),
            "buy_below_minimum" => Ok(ExecutionOutcome::BuyBelowMinimum),
            "completed" => Ok(ExecutionOutcome::Completed),
            "sell_below_minimum" => Ok(ExecutionOutcome::SellBelowMinimum),
            "stop_loss_placed" => Ok(ExecutionOutcome::StopLossPlaced),
            _ => Err(format!("Unknown execution outcome: {}", s)),
        }
    }
}

/// Everything known about one execution sequence.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub direction: Direction,
    pub pair: String,
    pub buy_exchange: String,
    pub sell_exchange: String,
    pub buy: LegOutcome,
    pub sell: Option<LegOutcome>,
    pub stop_loss: Option<StopLossOrder>,
    pub outcome: ExecutionOutcome,
    /// `filled × ask × pure profit` for completed sequences, zero otherwise.
    pub estimated_profit: Decimal,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Places and tracks the order pair of an opportunity.
///
/// `execute` must be called with the trading lock held so that no other
/// sequence or balance refresh interleaves with it.
pub struct ExecutionCoordinator {
    venues: [Arc<dyn Exchange>; 2],
    pair: String,
    fees: FeeModel,
    risk: RiskLimiter,
    schedule: PollSchedule,
    cancel_unfilled_sell: bool,
    stop_loss_slippage: Decimal,
}

impl ExecutionCoordinator {
    pub fn new(
        venues: [Arc<dyn Exchange>; 2],
        pair: impl Into<String>,
        fees: FeeModel,
        risk: RiskLimiter,
        config: &ExecutionConfig,
    ) -> Self {
        Self {
            venues,
            pair: pair.into(),
            fees,
            risk,
            schedule: PollSchedule::from_config(config),
            cancel_unfilled_sell: config.cancel_unfilled_sell(),
            stop_loss_slippage: config.stop_loss_slippage(),
        }
    }

    /// Replaces the poll schedule.
    #[cfg(test)]
    pub fn with_schedule(mut self, schedule: PollSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    fn venue(&self, slot: VenueSlot) -> &dyn Exchange {
        self.venues[slot.index()].as_ref()
    }

    /// Runs the buy-then-sell sequence for `opp`.
    ///
    /// Venue failures abort the sequence and are returned as errors; any
    /// position taken before the failure is left as is.
    pub async fn execute(&self, opp: &Opportunity) -> Result<ExecutionReport> {
        let started_at = Utc::now();
        let start = Instant::now();
        let buy_venue = self.venue(opp.direction.buy_slot());
        let sell_venue = self.venue(opp.direction.sell_slot());

        info!(
            pair = %self.pair,
            direction = %opp.direction,
            buy = %opp.buy_exchange,
            sell = %opp.sell_exchange,
            ask = %opp.ask.price,
            bid = %opp.bid.price,
            quantity = %opp.quantity,
            pure_profit = %opp.pure_profit,
            "Executing opportunity"
        );

        let mut report = ExecutionReport {
            direction: opp.direction,
            pair: self.pair.clone(),
            buy_exchange: opp.buy_exchange.clone(),
            sell_exchange: opp.sell_exchange.clone(),
            buy: LegOutcome {
                order_id: String::new(),
                price: opp.ask.price,
                requested: opp.quantity,
                filled: Decimal::ZERO,
                remaining: opp.quantity,
                closed: false,
                cancelled: false,
            },
            sell: None,
            stop_loss: None,
            outcome: ExecutionOutcome::NoFill,
            estimated_profit: Decimal::ZERO,
            started_at,
            elapsed: Duration::ZERO,
        };

        report.buy = self
            .place_and_track(buy_venue, OrderSide::Buy, opp.quantity, opp.ask.price, true)
            .await?;
        let filled = report.buy.filled;

        if filled <= Decimal::ZERO {
            debug!(pair = %self.pair, order_id = %report.buy.order_id, "Buy order not filled");
            return Ok(self.finish(report, ExecutionOutcome::NoFill, start));
        }

        // Venues may round the amount down after placement.
        let min_follow_up = self.risk.min_trade_size(opp.min_price()) * MIN_FOLLOW_UP_RATIO;
        if filled < min_follow_up {
            warn!(
                pair = %self.pair,
                order_id = %report.buy.order_id,
                filled = %filled,
                minimum = %min_follow_up,
                "Buy fill below minimum, leaving it unhedged"
            );
            return Ok(self.finish(report, ExecutionOutcome::BuyBelowMinimum, start));
        }

        let sell = self
            .place_and_track(
                sell_venue,
                OrderSide::Sell,
                filled,
                opp.bid.price,
                self.cancel_unfilled_sell,
            )
            .await?;
        let sell_closed = sell.closed;
        let remaining = sell.remaining;
        report.sell = Some(sell);

        if sell_closed {
            report.estimated_profit = opp.estimated_profit(filled);
            info!(
                pair = %self.pair,
                filled = %filled,
                pure_profit = %opp.pure_profit,
                estimated_profit = %report.estimated_profit,
                "Arbitrage completed"
            );
            return Ok(self.finish(report, ExecutionOutcome::Completed, start));
        }

        let fee = self.fees.fee_rate(opp.bid.price, false);
        let stop_price =
            opp.ask.price + opp.ask.price * (fee + self.stop_loss_slippage);
        let min_stop = self.risk.min_trade_size(stop_price) * MIN_FOLLOW_UP_RATIO;
        if remaining < min_stop {
            warn!(
                pair = %self.pair,
                remaining = %remaining,
                minimum = %min_stop,
                "Unsold remainder below minimum, leaving it unhedged"
            );
            return Ok(self.finish(report, ExecutionOutcome::SellBelowMinimum, start));
        }

        let order = sell_venue
            .create_limit_order(OrderSide::Sell, &self.pair, remaining, stop_price)
            .await?;
        warn!(
            pair = %self.pair,
            exchange = %sell_venue.name(),
            order_id = %order.id,
            amount = %remaining,
            stop_price = %stop_price,
            ask = %opp.ask.price,
            "Stop-loss sell placed, left resting"
        );
        report.stop_loss = Some(StopLossOrder {
            order_id: order.id,
            price: stop_price,
            amount: remaining,
        });

        Ok(self.finish(report, ExecutionOutcome::StopLossPlaced, start))
    }

    fn finish(
        &self,
        mut report: ExecutionReport,
        outcome: ExecutionOutcome,
        start: Instant,
    ) -> ExecutionReport {
        report.outcome = outcome;
        report.elapsed = start.elapsed();
        report
    }

    /// Places a limit order and polls it on the schedule. An order still
    /// open after the last poll is cancelled when `cancel_on_timeout` is set;
    /// the outcome then carries the amounts seen at the last poll.
    async fn place_and_track(
        &self,
        exchange: &dyn Exchange,
        side: OrderSide,
        amount: Decimal,
        price: Decimal,
        cancel_on_timeout: bool,
    ) -> Result<LegOutcome> {
        debug!(
            exchange = %exchange.name(),
            side = %side,
            amount = %amount,
            price = %price,
            "Placing limit order"
        );
        let mut order = exchange
            .create_limit_order(side, &self.pair, amount, price)
            .await?;

        tokio::time::sleep(self.schedule.settle_delay).await;

        if order.status.is_none() {
            order = self.resolve_status(exchange, &order.id, amount).await?;
        }

        if !order.is_closed() {
            for delay in &self.schedule.retry_delays {
                tokio::time::sleep(*delay).await;
                order = self.resolve_status(exchange, &order.id, amount).await?;
                if order.is_closed() {
                    break;
                }
            }
        }

        let mut cancelled = order.status == Some(OrderStatus::Cancelled);
        if !order.is_closed() && !cancelled && cancel_on_timeout {
            exchange.cancel_order(&order.id, &self.pair).await?;
            cancelled = true;
            debug!(
                exchange = %exchange.name(),
                side = %side,
                order_id = %order.id,
                filled = %order.filled,
                "Order cancelled after last poll"
            );
        }

        debug!(
            exchange = %exchange.name(),
            side = %side,
            order_id = %order.id,
            filled = %order.filled,
            remaining = %order.remaining,
            closed = order.is_closed(),
            "Order tracked"
        );

        Ok(LegOutcome {
            closed: order.is_closed(),
            cancelled,
            order_id: order.id,
            price,
            requested: amount,
            filled: order.filled,
            remaining: order.remaining,
        })
    }

    /// Fetches the current state of an order. Venues without order lookup
    /// are searched through their open orders; an order missing from that
    /// list is assumed to be completely filled.
    async fn resolve_status(
        &self,
        exchange: &dyn Exchange,
        order_id: &str,
        requested: Decimal,
    ) -> Result<Order> {
        if exchange.capabilities().fetch_order {
            return exchange.fetch_order(order_id, &self.pair).await;
        }

        let open = exchange.fetch_open_orders(&self.pair).await?;
        if let Some(order) = open.into_iter().find(|o| o.id == order_id) {
            return Ok(order);
        }

        debug!(
            exchange = %exchange.name(),
            order_id = %order_id,
            "Order not among open orders, assuming filled"
        );
        Ok(Order {
            id: order_id.to_string(),
            exchange: exchange.name().to_string(),
            pair: self.pair.clone(),
            side: OrderSide::Buy,
            price: Decimal::ZERO,
            amount: requested,
            filled: requested,
            remaining: Decimal::ZERO,
            status: Some(OrderStatus::Closed),
            created_at: std::time::SystemTime::now(),
        })
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
