//! Application-level configuration.

use serde::Deserialize;
use std::fmt;

/// Deployment environment. Anything but development trades with real keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };
        f.write_str(name)
    }
}

/// Application-level settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Instance name, shown in logs and alerts.
    pub name: String,
    #[serde(default)]
    pub env: Environment,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Real venues need API credentials outside development.
    pub fn requires_credentials(&self) -> bool {
        self.env != Environment::Development
    }

    /// Log level directive, `warning` accepted as an alias of `warn`.
    pub fn log_filter(&self) -> &str {
        match self.log_level.as_deref().map(str::trim) {
            Some("warning") => "warn",
            Some(level) if !level.is_empty() => level,
            _ => "info",
        }
    }
}
