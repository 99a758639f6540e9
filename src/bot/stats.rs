//! Runtime statistics for the bot.

use rust_decimal::Decimal;

use crate::arbitrage::{ExecutionOutcome, ExecutionReport};

/// Runtime statistics for the bot.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub detection_cycles: u64,
    pub opportunities_detected: u64,
    /// Execution sequences that ran to an outcome.
    pub executions: u64,
    pub completed: u64,
    pub no_fills: u64,
    /// Sequences that left a position too small to follow up.
    pub unhedged: u64,
    pub stop_losses: u64,
    /// Trading attempts aborted by a venue error.
    pub failed: u64,
    pub total_profit: Decimal,
    /// Quote amount spent on buy legs.
    pub total_volume: Decimal,
    pub best_trade: Decimal,
}

impl Stats {
    /// Accounts for a finished execution sequence.
    pub fn record(&mut self, report: &ExecutionReport) {
        self.executions += 1;
        self.total_volume += report.buy.filled * report.buy.price;

        match report.outcome {
            ExecutionOutcome::Completed => {
                self.completed += 1;
                self.total_profit += report.estimated_profit;
                self.best_trade = self.best_trade.max(report.estimated_profit);
            }
            ExecutionOutcome::NoFill => self.no_fills += 1,
            ExecutionOutcome::BuyBelowMinimum | ExecutionOutcome::SellBelowMinimum => {
                self.unhedged += 1
            }
            ExecutionOutcome::StopLossPlaced => self.stop_losses += 1,
        }
    }
}
