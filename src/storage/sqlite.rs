//! SQLite implementation of ExecutionStorage.

use crate::arbitrage::{ExecutionOutcome, ExecutionReport, LegOutcome};
use crate::domain::Direction;
use crate::storage::{ExecutionRecord, ExecutionStorage, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use tracing::{debug, info};

const SELECT_COLUMNS: &str = r#"
    SELECT id, direction, pair, buy_exchange, sell_exchange, outcome,
        buy_order_id, buy_price, bought, sell_order_id, sell_price, sold,
        stop_loss_order_id, stop_loss_price, estimated_profit, started_at, elapsed_ms
    FROM executions
"#;

/// SqliteStorage implements ExecutionStorage using SQLite.
pub struct SqliteStorage {
    pool: Pool<Sqlite>,
}

/// SqliteStorageConfig holds SQLite storage configuration.
#[derive(Debug, Clone)]
pub struct SqliteStorageConfig {
    /// Path to the SQLite database file.
    pub path: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
}

impl Default for SqliteStorageConfig {
    fn default() -> Self {
        Self {
            path: "executions.db".to_string(),
            max_connections: 5,
        }
    }
}

impl SqliteStorage {
    /// Creates a new SQLite storage instance.
    pub async fn new(config: SqliteStorageConfig) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let storage = Self { pool };

        storage.migrate().await?;

        info!(path = %config.path, "SQLite storage initialized");
        Ok(storage)
    }

    /// Runs database migrations to create the schema.
    async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                direction TEXT NOT NULL,
                pair TEXT NOT NULL,
                buy_exchange TEXT NOT NULL,
                sell_exchange TEXT NOT NULL,
                outcome TEXT NOT NULL,
                buy_order_id TEXT NOT NULL,
                buy_price TEXT NOT NULL,
                bought TEXT NOT NULL,
                sell_order_id TEXT,
                sell_price TEXT,
                sold TEXT,
                stop_loss_order_id TEXT,
                stop_loss_price TEXT,
                estimated_profit TEXT NOT NULL,
                started_at TEXT NOT NULL,
                elapsed_ms INTEGER NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_executions_pair ON executions(pair)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_executions_started_at ON executions(started_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Identifies an execution by the venue order ids it produced.
///
/// Order ids are unique per venue, so the same report saved twice maps to
/// the same hash.
fn generate_unique_hash(report: &ExecutionReport) -> String {
    let sell_id = report.sell.as_ref().map_or("", |leg| leg.order_id.as_str());
    let stop_id = report
        .stop_loss
        .as_ref()
        .map_or("", |stop| stop.order_id.as_str());

    let data = format!(
        "{}|{}|{}|{}|{}",
        report.buy_exchange, report.buy.order_id, report.sell_exchange, sell_id, stop_id
    );

    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    let hash = hasher.finalize();

    // Use first 16 bytes for shorter hash
    hex::encode(&hash[..16])
}

#[async_trait]
impl ExecutionStorage for SqliteStorage {
    async fn save(&self, report: &ExecutionReport) -> Result<bool, StorageError> {
        let id = generate_unique_hash(report);
        let sell: Option<&LegOutcome> = report.sell.as_ref();
        let stop = report.stop_loss.as_ref();
        let elapsed_ms = i64::try_from(report.elapsed.as_millis()).unwrap_or(i64::MAX);

        let result = sqlx::query(
            r#"
            INSERT INTO executions (
                id, direction, pair, buy_exchange, sell_exchange, outcome,
                buy_order_id, buy_price, bought, sell_order_id, sell_price, sold,
                stop_loss_order_id, stop_loss_price, estimated_profit, started_at, elapsed_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(report.direction.to_string())
        .bind(&report.pair)
        .bind(&report.buy_exchange)
        .bind(&report.sell_exchange)
        .bind(report.outcome.as_str())
        .bind(&report.buy.order_id)
        .bind(report.buy.price.to_string())
        .bind(report.buy.filled.to_string())
        .bind(sell.map(|leg| leg.order_id.clone()))
        .bind(sell.map(|leg| leg.price.to_string()))
        .bind(sell.map(|leg| leg.filled.to_string()))
        .bind(stop.map(|s| s.order_id.clone()))
        .bind(stop.map(|s| s.price.to_string()))
        .bind(report.estimated_profit.to_string())
        .bind(report.started_at.to_rfc3339())
        .bind(elapsed_ms)
        .execute(&self.pool)
        .await?;

        let rows_affected = result.rows_affected();

        if rows_affected > 0 {
            debug!(
                id = %id,
                pair = %report.pair,
                outcome = %report.outcome,
                "Execution saved"
            );
        }

        Ok(rows_affected > 0)
    }

    async fn recent(&self, pair: &str, limit: u32) -> Result<Vec<ExecutionRecord>, StorageError> {
        let query = format!(
            "{} WHERE pair = ? ORDER BY started_at DESC LIMIT ?",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(pair)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(parse_execution_row).collect()
    }

    async fn count(&self) -> Result<i64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM executions")
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.pool.close().await;
        Ok(())
    }
}

fn parse_decimal(row: &SqliteRow, column: &str) -> Result<Decimal, StorageError> {
    let value: String = row.try_get(column)?;
    Decimal::from_str(&value)
        .map_err(|e| StorageError::InvalidData(format!("Invalid {}: {}", column, e)))
}

fn parse_optional_decimal(row: &SqliteRow, column: &str) -> Result<Option<Decimal>, StorageError> {
    let value: Option<String> = row.try_get(column)?;
    value
        .map(|v| {
            Decimal::from_str(&v)
                .map_err(|e| StorageError::InvalidData(format!("Invalid {}: {}", column, e)))
        })
        .transpose()
}

/// Parses an execution from a database row.
fn parse_execution_row(row: &SqliteRow) -> Result<ExecutionRecord, StorageError> {
    let direction_str: String = row.try_get("direction")?;
    let direction = Direction::from_str(&direction_str).map_err(StorageError::InvalidData)?;

    let outcome_str: String = row.try_get("outcome")?;
    let outcome = ExecutionOutcome::from_str(&outcome_str).map_err(StorageError::InvalidData)?;

    let started_at_str: String = row.try_get("started_at")?;
    let started_at = DateTime::parse_from_rfc3339(&started_at_str)
        .map_err(|e| StorageError::InvalidData(format!("Invalid started_at: {}", e)))?
        .with_timezone(&Utc);

    Ok(ExecutionRecord {
        id: row.try_get("id")?,
        direction,
        pair: row.try_get("pair")?,
        buy_exchange: row.try_get("buy_exchange")?,
        sell_exchange: row.try_get("sell_exchange")?,
        outcome,
        buy_order_id: row.try_get("buy_order_id")?,
        buy_price: parse_decimal(row, "buy_price")?,
        bought: parse_decimal(row, "bought")?,
        sell_order_id: row.try_get("sell_order_id")?,
        sell_price: parse_optional_decimal(row, "sell_price")?,
        sold: parse_optional_decimal(row, "sold")?,
        stop_loss_order_id: row.try_get("stop_loss_order_id")?,
        stop_loss_price: parse_optional_decimal(row, "stop_loss_price")?,
        estimated_profit: parse_decimal(row, "estimated_profit")?,
        started_at,
        elapsed_ms: row.try_get("elapsed_ms")?,
    })
}
