//! Configuration error types.

use thiserror::Error;

/// Configuration loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("exchange {0} is not configured")]
    UnknownVenue(String),
    #[error("{field}: invalid decimal {value:?}")]
    InvalidDecimal { field: String, value: String },
    #[error("validation failed: {0}")]
    Validation(String),
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Validation(message.into())
    }
}
