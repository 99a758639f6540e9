mod arbitrage;
mod balance;
mod bot;
mod config;
mod domain;
mod exchanges;
mod notification;
mod storage;

use bot::{Bot, BotConfig};
use config::Config;
use exchanges::VenueRegistry;
use std::env;
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

fn parse_config_path() -> String {
    for arg in env::args().skip(1) {
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    DEFAULT_CONFIG_PATH.to_string()
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[tokio::main]
async fn main() {
    let config_path = parse_config_path();

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config {}: {}", config_path, e);
            process::exit(1);
        }
    };

    init_tracing(config.app.log_filter());
    let bot_env = config.app.env;

    let bot = match Bot::new(BotConfig::new(config), &VenueRegistry::default()).await {
        Ok(bot) => Arc::new(bot),
        Err(e) => {
            error!(error = %e, "Failed to create bot");
            process::exit(1);
        }
    };

    info!(
        config = %config_path,
        env = %bot_env,
        dry_run = bot.is_dry_run(),
        "Bot initialized"
    );

    let signal_bot = Arc::clone(&bot);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            if let Err(e) = signal_bot.stop().await {
                error!(error = %e, "Failed to stop bot");
            }
        }
    });

    if let Err(e) = bot.start().await {
        error!(error = %e, "Bot error");
        let _ = bot.stop().await;
        process::exit(1);
    }

    let _ = bot.stop().await;
}
