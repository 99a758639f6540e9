//! Bot configuration.

use std::sync::Arc;

use crate::config::Config;
use crate::notification::Notifier;

/// Bot configuration options.
pub struct BotConfig {
    /// Application configuration.
    pub app_config: Config,
    /// Both venues are simulated.
    pub dry_run: bool,
    /// Application version.
    pub version: String,
    /// Build timestamp.
    pub build_time: String,
    /// Replaces the notifier built from the notification settings.
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl BotConfig {
    pub fn new(app_config: Config) -> Self {
        let dry_run = app_config
            .venue_names()
            .iter()
            .all(|name| {
                app_config
                    .venue(name)
                    .is_some_and(|venue| venue.kind(name) == crate::config::PAPER_KIND)
            });

        Self {
            app_config,
            dry_run,
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_time: String::new(),
            notifier: None,
        }
    }
}
