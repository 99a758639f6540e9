//! Bot error types.

use crate::config::ConfigError;
use crate::exchanges::ExchangeError;
use crate::storage::StorageError;

/// Bot error type.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("bot is already running")]
    AlreadyRunning,
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("exchange {venue} does not support {}", missing.join(", "))]
    MissingCapability {
        venue: String,
        missing: Vec<&'static str>,
    },
    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
