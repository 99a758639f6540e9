//! Storage interfaces and implementations for the execution journal.

mod sqlite;

pub use sqlite::{SqliteStorage, SqliteStorageConfig};

use crate::arbitrage::{ExecutionOutcome, ExecutionReport};
use crate::domain::Direction;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// ExecutionStorage defines the interface of the execution journal.
#[async_trait]
pub trait ExecutionStorage: Send + Sync {
    /// Save persists an execution report.
    /// Returns true if the report was saved (new), false if it already exists.
    async fn save(&self, report: &ExecutionReport) -> Result<bool, StorageError>;

    /// Recent retrieves the latest `limit` executions of `pair`, newest first.
    async fn recent(&self, pair: &str, limit: u32) -> Result<Vec<ExecutionRecord>, StorageError>;

    /// Count returns the total number of stored executions.
    async fn count(&self) -> Result<i64, StorageError>;

    /// Close closes the storage connection.
    async fn close(&self) -> Result<(), StorageError>;
}

/// One journaled execution, flattened from an [`ExecutionReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    /// Hash of the venue order ids; identifies the execution.
    pub id: String,
    pub direction: Direction,
    pub pair: String,
    pub buy_exchange: String,
    pub sell_exchange: String,
    pub outcome: ExecutionOutcome,
    pub buy_order_id: String,
    pub buy_price: Decimal,
    pub bought: Decimal,
    pub sell_order_id: Option<String>,
    pub sell_price: Option<Decimal>,
    pub sold: Option<Decimal>,
    pub stop_loss_order_id: Option<String>,
    pub stop_loss_price: Option<Decimal>,
    pub estimated_profit: Decimal,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: i64,
}

impl fmt::Display for ExecutionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} [{}]: bought {} at {} on {} (order {})",
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.pair,
            self.direction,
            self.outcome,
            self.id,
            self.bought,
            self.buy_price,
            self.buy_exchange,
            self.buy_order_id
        )?;
        if let (Some(order_id), Some(sold), Some(price)) =
            (&self.sell_order_id, self.sold, self.sell_price)
        {
            write!(
                f,
                ", sold {} at {} on {} (order {})",
                sold, price, self.sell_exchange, order_id
            )?;
        }
        if let (Some(order_id), Some(price)) = (&self.stop_loss_order_id, self.stop_loss_price) {
            write!(f, ", stop loss at {} (order {})", price, order_id)?;
        }
        write!(f, ", profit {} in {}ms", self.estimated_profit, self.elapsed_ms)
    }
}

/// StorageError represents errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}
