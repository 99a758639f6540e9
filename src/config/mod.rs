//! Configuration loading and validation for the arbitrage engine.
//!
//! Uses serde_yaml to load YAML configuration files with support for
//! environment variable overrides for sensitive credentials.

mod app;
mod arbitrage;
mod balance;
mod duration;
mod error;
mod exchange;
mod execution;
mod notification;
mod risk;
mod storage;

pub use app::AppConfig;
pub use arbitrage::ArbitrageConfig;
pub use balance::BalanceConfig;
pub use error::ConfigError;
pub use exchange::{ExchangeConfig, PaperConfig};
pub use execution::ExecutionConfig;
pub use notification::{NotificationConfig, TelegramConfig};
pub use risk::RiskConfig;
pub use storage::StorageConfig;

use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::{collections::HashMap, env, fs};

/// Registry id of the built-in simulated venue.
pub const PAPER_KIND: &str = "paper";

/// Root configuration structure for the arbitrage engine.
///
/// Required sections: app, exchanges, arbitrage.
/// Optional sections: risk, balance, execution, notification, storage.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Application-level settings like name and environment.
    pub app: AppConfig,
    /// Maps venue names to their configurations.
    pub exchanges: HashMap<String, ExchangeConfig>,
    /// Pair, venues and profit thresholds.
    pub arbitrage: ArbitrageConfig,
    /// Trade size and open order limits (optional).
    pub risk: Option<RiskConfig>,
    /// Balance refresh and alert thresholds (optional).
    pub balance: Option<BalanceConfig>,
    /// Order polling schedule and error backoff (optional).
    pub execution: Option<ExecutionConfig>,
    /// Alert channels like Telegram (optional).
    pub notification: Option<NotificationConfig>,
    /// Execution journal (optional).
    pub storage: Option<StorageConfig>,
}

impl Config {
    /// Load configuration from a YAML file at the given path.
    ///
    /// First loads environment variables from `.env` file (if exists),
    /// then loads YAML config and credentials from environment variables:
    /// - `{EXCHANGE}_API_KEY`, `{EXCHANGE}_API_SECRET`, `{EXCHANGE}_API_PASSWORD`
    /// - `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`, `TELEGRAM_ERROR_CHAT_ID`
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore error if not found)
        dotenvy::dotenv().ok();

        let content = fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;

        config.load_credentials_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Returns the configuration of a venue by name.
    pub fn venue(&self, name: &str) -> Option<&ExchangeConfig> {
        self.exchanges.get(name)
    }

    /// Names of the two traded venues, first then second.
    pub fn venue_names(&self) -> [String; 2] {
        [
            self.arbitrage.first_venue.clone(),
            self.arbitrage.second_venue.clone(),
        ]
    }

    pub fn risk(&self) -> RiskConfig {
        self.risk.clone().unwrap_or_default()
    }

    pub fn balance(&self) -> BalanceConfig {
        self.balance.clone().unwrap_or_default()
    }

    pub fn execution(&self) -> ExecutionConfig {
        self.execution.clone().unwrap_or_default()
    }

    /// Load credentials from environment variables.
    fn load_credentials_from_env(&mut self) {
        // Load exchange credentials
        for (name, exchange) in self.exchanges.iter_mut() {
            if !exchange.enabled {
                continue;
            }

            let env_prefix = name.to_uppercase();
            exchange.api_key = env::var(format!("{}_API_KEY", env_prefix)).unwrap_or_default();
            exchange.api_secret =
                env::var(format!("{}_API_SECRET", env_prefix)).unwrap_or_default();
            exchange.api_password = env::var(format!("{}_API_PASSWORD", env_prefix)).ok();
        }

        // Load Telegram credentials
        if let Some(ref mut notification) = self.notification {
            if let Some(ref mut telegram) = notification.telegram {
                if telegram.enabled {
                    telegram.bot_token = env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default();
                    telegram.chat_id = env::var("TELEGRAM_CHAT_ID").unwrap_or_default();
                    telegram.error_chat_id = env::var("TELEGRAM_ERROR_CHAT_ID").unwrap_or_default();
                }
            }
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.app.name.is_empty() {
            return Err(ConfigError::invalid("app.name is required"));
        }

        let arb = &self.arbitrage;
        let mut coins = arb.pair.split('/');
        let valid_pair = matches!(
            (coins.next(), coins.next(), coins.next()),
            (Some(base), Some(quote), None) if !base.is_empty() && !quote.is_empty()
        );
        if !valid_pair {
            return Err(ConfigError::invalid(format!(
                "arbitrage.pair must look like BASE/QUOTE, got {:?}",
                arb.pair
            )));
        }

        if arb.first_venue == arb.second_venue {
            return Err(ConfigError::invalid(
                "arbitrage.first_venue and arbitrage.second_venue must differ",
            ));
        }

        for name in [&arb.first_venue, &arb.second_venue] {
            let exchange = self
                .venue(name)
                .ok_or_else(|| ConfigError::UnknownVenue(name.clone()))?;

            if !exchange.enabled {
                return Err(ConfigError::invalid(format!(
                    "exchange {} is traded but not enabled",
                    name
                )));
            }

            if exchange.fee_taker.is_none() {
                return Err(ConfigError::invalid(format!(
                    "exchange {}: fee_taker is required",
                    name
                )));
            }

            check_decimal(&format!("exchange {}: fee_taker", name), exchange.fee_taker.as_ref())?;
            check_decimal(
                &format!("exchange {}: withdraw_fee_base", name),
                exchange.withdraw_fee_base.as_ref(),
            )?;
            check_decimal(
                &format!("exchange {}: withdraw_fee_quote", name),
                exchange.withdraw_fee_quote.as_ref(),
            )?;
            if let Some(ref paper) = exchange.paper {
                check_decimal(&format!("exchange {}: paper.base_balance", name), paper.base_balance.as_ref())?;
                check_decimal(&format!("exchange {}: paper.quote_balance", name), paper.quote_balance.as_ref())?;
                for (side, levels) in [("asks", &paper.asks), ("bids", &paper.bids)] {
                    for [price, quantity] in levels {
                        let field = format!("exchange {}: paper.{}", name, side);
                        if matches!(check_decimal(&field, Some(price))?, Some(p) if p.is_zero()) {
                            return Err(ConfigError::invalid(format!(
                                "{} price must be positive",
                                field
                            )));
                        }
                        check_decimal(&field, Some(quantity))?;
                    }
                }
            }

            let needs_credentials = exchange.kind(name) != PAPER_KIND;
            if self.app.requires_credentials()
                && needs_credentials
                && (exchange.api_key.is_empty() || exchange.api_secret.is_empty())
            {
                return Err(ConfigError::invalid(format!(
                    "exchange {}: API credentials not found (set {}_API_KEY and {}_API_SECRET env vars)",
                    name,
                    name.to_uppercase(),
                    name.to_uppercase()
                )));
            }
        }

        for (field, value) in [
            ("arbitrage.first_to_second_profit_limit", arb.first_to_second_profit_limit.as_ref()),
            ("arbitrage.second_to_first_profit_limit", arb.second_to_first_profit_limit.as_ref()),
        ] {
            if value.is_none() {
                return Err(ConfigError::invalid(format!("{} is required", field)));
            }
            check_decimal(field, value)?;
        }

        check_decimal("arbitrage.quote_coin_notional", arb.quote_coin_notional.as_ref())?;
        let notional = check_decimal("arbitrage.base_coin_notional", arb.base_coin_notional.as_ref())?;
        if matches!(notional, Some(n) if n <= Decimal::ZERO) {
            return Err(ConfigError::invalid(
                "arbitrage.base_coin_notional must be positive",
            ));
        }

        if let Some(ref risk) = self.risk {
            if let Some(max_open_orders) = risk.max_open_orders {
                if max_open_orders <= 0 {
                    return Err(ConfigError::invalid(
                        "risk.max_open_orders must be positive",
                    ));
                }
            }

            let min = check_decimal("risk.min_trade_size_quote", risk.min_trade_size_quote.as_ref())?;
            let max = check_decimal("risk.max_trade_size_quote", risk.max_trade_size_quote.as_ref())?;
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(ConfigError::invalid(
                        "risk.min_trade_size_quote must not exceed risk.max_trade_size_quote",
                    ));
                }
            }
        }

        if let Some(ref balance) = self.balance {
            check_decimal("balance.base_alert_threshold", balance.base_alert_threshold.as_ref())?;
            check_decimal("balance.quote_alert_threshold", balance.quote_alert_threshold.as_ref())?;
        }

        if let Some(ref execution) = self.execution {
            check_decimal("execution.stop_loss_slippage", execution.stop_loss_slippage.as_ref())?;
        }

        Ok(())
    }
}

/// Parses an optional decimal string, falling back to `default` when unset
/// or unparsable. Values are checked by `validate` at load time.
pub(crate) fn decimal_or(value: Option<&String>, default: Decimal) -> Decimal {
    value
        .and_then(|s| Decimal::from_str(s.trim()).ok())
        .unwrap_or(default)
}

/// Validates an optional non-negative decimal string.
fn check_decimal(field: &str, value: Option<&String>) -> Result<Option<Decimal>, ConfigError> {
    let Some(raw) = value else {
        return Ok(None);
    };

    let parsed = Decimal::from_str(raw.trim()).map_err(|_| ConfigError::InvalidDecimal {
        field: field.to_string(),
        value: raw.clone(),
    })?;

    if parsed.is_sign_negative() && !parsed.is_zero() {
        return Err(ConfigError::invalid(format!(
            "{} must not be negative",
            field
        )));
    }

    Ok(Some(parsed))
}
