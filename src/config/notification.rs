//! Notification configuration.

use serde::Deserialize;
use std::time::Duration;

use super::duration;

const DEFAULT_OVERVIEW_INTERVAL: Duration = Duration::from_secs(3600);

/// Notification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub telegram: Option<TelegramConfig>,
}

impl NotificationConfig {
    /// Telegram settings when the channel is switched on and has credentials.
    pub fn active_telegram(&self) -> Option<&TelegramConfig> {
        self.telegram
            .as_ref()
            .filter(|t| t.enabled && !t.bot_token.is_empty() && !t.chat_id.is_empty())
    }

    /// Period of the stats overview. Zero or unset means one hour.
    pub fn overview_interval(&self) -> Duration {
        self.telegram
            .as_ref()
            .map(|t| t.overview_interval)
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_OVERVIEW_INTERVAL)
    }
}

/// Telegram channel settings. Secrets come from the environment only.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    /// TELEGRAM_BOT_TOKEN
    #[serde(skip)]
    pub bot_token: String,
    /// TELEGRAM_CHAT_ID
    #[serde(skip)]
    pub chat_id: String,
    /// TELEGRAM_ERROR_CHAT_ID, falls back to the main chat when empty.
    #[serde(skip)]
    pub error_chat_id: String,
    #[serde(default)]
    pub notify_opportunities: bool,
    #[serde(default)]
    pub notify_executions: bool,
    #[serde(default)]
    pub notify_errors: bool,
    #[serde(default)]
    pub notify_overview: bool,
    #[serde(default, with = "duration")]
    pub overview_interval: Duration,
}
