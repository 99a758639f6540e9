//! Execution journal configuration.

use serde::Deserialize;

const DEFAULT_JOURNAL_PATH: &str = "executions.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Execution journal settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Record finished execution sequences.
    #[serde(default)]
    pub enabled: bool,
    /// SQLite database file.
    pub path: Option<String>,
    /// Connection pool size.
    pub max_connections: Option<u32>,
}

impl StorageConfig {
    pub fn journal_path(&self) -> &str {
        self.path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_JOURNAL_PATH)
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }
}
