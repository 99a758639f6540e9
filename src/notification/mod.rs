//! Alert notifications (Telegram) for executions, errors and low balances.

mod notifier;
mod telegram;

pub use notifier::{
    BalanceAlertData, ErrorData, Event, EventType, ExecutionData, MultiNotifier,
    NoopNotifier, NotificationError, Notifier, OpportunityData, OverviewData, ShutdownData,
    StartupData, format_event,
};
pub use telegram::{TelegramConfig, TelegramNotifier};
