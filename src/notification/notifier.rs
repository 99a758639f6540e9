use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::arbitrage::{ExecutionOutcome, ExecutionReport, StopLossOrder};

/// Тип события уведомления
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Opportunity,
    /// Завершена последовательность сделок
    Execution,
    /// Баланс на площадке ниже порога
    BalanceAlert,
    Error,
    Startup,
    Shutdown,
    /// Периодический обзор статистики
    Overview,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Opportunity => "opportunity",
            EventType::Execution => "execution",
            EventType::BalanceAlert => "balance_alert",
            EventType::Error => "error",
            EventType::Startup => "startup",
            EventType::Shutdown => "shutdown",
            EventType::Overview => "overview",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Данные об арбитражной возможности
#[derive(Debug, Clone)]
pub struct OpportunityData {
    pub pair: String,
    pub buy_exchange: String,
    pub sell_exchange: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    /// Чистая прибыль после комиссий, в процентах
    pub profit_percent: Decimal,
    pub quantity: Decimal,
}

/// Данные о выполнении сделки
#[derive(Debug, Clone)]
pub struct ExecutionData {
    pub pair: String,
    pub buy_exchange: String,
    pub sell_exchange: String,
    pub outcome: ExecutionOutcome,
    /// Исполнено на покупке, в базовой валюте
    pub bought: Decimal,
    /// Исполнено на продаже, в базовой валюте
    pub sold: Decimal,
    pub stop_loss: Option<StopLossOrder>,
    pub estimated_profit: Decimal,
    pub execution_time: Duration,
}

impl From<&ExecutionReport> for ExecutionData {
    fn from(report: &ExecutionReport) -> Self {
        Self {
            pair: report.pair.clone(),
            buy_exchange: report.buy_exchange.clone(),
            sell_exchange: report.sell_exchange.clone(),
            outcome: report.outcome,
            bought: report.buy.filled,
            sold: report.sell.as_ref().map_or(Decimal::ZERO, |leg| leg.filled),
            stop_loss: report.stop_loss.clone(),
            estimated_profit: report.estimated_profit,
            execution_time: report.elapsed,
        }
    }
}

/// Данные о низком балансе
#[derive(Debug, Clone)]
pub struct BalanceAlertData {
    pub bot_name: String,
    pub exchange: String,
    pub asset: String,
    pub balance: Decimal,
    pub threshold: Decimal,
}

/// Данные об ошибке
#[derive(Debug, Clone)]
pub struct ErrorData {
    pub component: String,
    pub message: String,
    pub error: Option<String>,
}

/// Данные о запуске бота
#[derive(Debug, Clone)]
pub struct StartupData {
    pub version: String,
    pub exchanges: Vec<String>,
    pub pair: String,
    pub dry_run: bool,
}

/// Данные об остановке бота
#[derive(Debug, Clone)]
pub struct ShutdownData {
    pub reason: String,
    pub uptime: Duration,
    pub graceful: bool,
}

/// Данные периодического обзора
#[derive(Debug, Clone)]
pub struct OverviewData {
    pub uptime: Duration,
    pub detection_cycles: u64,
    pub opportunities_detected: u64,
    pub executions: u64,
    pub completed: u64,
    pub stop_losses: u64,
    pub failed: u64,
    pub total_profit: Decimal,
    pub dry_run: bool,
}

/// Данные события
#[derive(Debug, Clone)]
pub enum EventData {
    Opportunity(OpportunityData),
    Execution(ExecutionData),
    BalanceAlert(BalanceAlertData),
    Error(ErrorData),
    Startup(StartupData),
    Shutdown(ShutdownData),
    Overview(OverviewData),
}

macro_rules! event_data {
    ($($variant:ident($data:ty)),* $(,)?) => {
        impl EventData {
            pub fn event_type(&self) -> EventType {
                match self {
                    $(EventData::$variant(_) => EventType::$variant,)*
                }
            }
        }

        $(
            impl From<$data> for EventData {
                fn from(data: $data) -> Self {
                    EventData::$variant(data)
                }
            }
        )*
    };
}

event_data! {
    Opportunity(OpportunityData),
    Execution(ExecutionData),
    BalanceAlert(BalanceAlertData),
    Error(ErrorData),
    Startup(StartupData),
    Shutdown(ShutdownData),
    Overview(OverviewData),
}

/// Событие уведомления. Тип выводится из данных.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub data: EventData,
}

impl Event {
    pub fn new(data: impl Into<EventData>) -> Self {
        let data = data.into();
        Self {
            event_type: data.event_type(),
            timestamp: Utc::now(),
            data,
        }
    }
}

/// Канал доставки уведомлений
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Отправить и дождаться доставки
    async fn send(&self, event: &Event) -> Result<(), NotificationError>;

    /// Поставить в очередь, не блокируя торговый цикл
    fn send_async(&self, event: Event);

    fn is_enabled(&self, event_type: EventType) -> bool;

    /// Дослать очередь и освободить ресурсы
    async fn close(&self) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, Error)]
#[error("notification failed: {message}")]
pub struct NotificationError {
    pub message: String,
}

impl NotificationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Склеивает ошибки нескольких каналов в одну
    fn collect(results: Vec<Result<(), NotificationError>>) -> Result<(), NotificationError> {
        let errors: Vec<String> = results
            .into_iter()
            .filter_map(|r| r.err().map(|e| e.message))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(NotificationError::new(errors.join("; ")))
        }
    }
}

/// Рассылает событие во все каналы параллельно
pub struct MultiNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl MultiNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    fn interested(&self, event_type: EventType) -> impl Iterator<Item = &Arc<dyn Notifier>> {
        self.notifiers
            .iter()
            .filter(move |n| n.is_enabled(event_type))
    }
}

#[async_trait::async_trait]
impl Notifier for MultiNotifier {
    async fn send(&self, event: &Event) -> Result<(), NotificationError> {
        let results = join_all(self.interested(event.event_type).map(|n| n.send(event))).await;
        NotificationError::collect(results)
    }

    fn send_async(&self, event: Event) {
        for notifier in self.interested(event.event_type) {
            notifier.send_async(event.clone());
        }
    }

    fn is_enabled(&self, event_type: EventType) -> bool {
        self.interested(event_type).next().is_some()
    }

    async fn close(&self) -> Result<(), NotificationError> {
        let results = join_all(self.notifiers.iter().map(|n| n.close())).await;
        NotificationError::collect(results)
    }
}

/// Заглушка, когда ни один канал не настроен
#[derive(Default)]
pub struct NoopNotifier;

impl NoopNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _event: &Event) -> Result<(), NotificationError> {
        Ok(())
    }

    fn send_async(&self, _event: Event) {}

    fn is_enabled(&self, _event_type: EventType) -> bool {
        false
    }

    async fn close(&self) -> Result<(), NotificationError> {
        Ok(())
    }
}

// === Форматирование ===

/// Markdown-сообщение: заголовок, строки и отметка времени в конце
struct Message {
    text: String,
}

impl Message {
    fn new(title: &str) -> Self {
        Self {
            text: format!("{}\n\n", title),
        }
    }

    fn line(mut self, label: &str, value: impl fmt::Display) -> Self {
        let _ = writeln!(self.text, "{}: {}", label, value);
        self
    }

    fn text(mut self, value: impl fmt::Display) -> Self {
        let _ = writeln!(self.text, "{}", value);
        self
    }

    fn gap(mut self) -> Self {
        self.text.push('\n');
        self
    }

    fn finish(mut self) -> String {
        if !self.text.ends_with("\n\n") {
            self.text.push('\n');
        }
        let _ = write!(self.text, "⏰ {}", Utc::now().format("%H:%M:%S UTC"));
        self.text
    }
}

fn mode_label(dry_run: bool) -> &'static str {
    if dry_run { "🧪 DRY RUN" } else { "🚀 LIVE" }
}

pub fn format_opportunity(data: &OpportunityData) -> String {
    let base = parse_pair_base(&data.pair);

    Message::new("🔔 *Арбитражная возможность*")
        .text(format_args!("💰 Чистая прибыль: *{:.3}%*", data.profit_percent))
        .gap()
        .line("Пара", format_args!("{} #{}", data.pair, format_pair_tag(&data.pair)))
        .line("Покупка", format_args!("{} @ {}", data.buy_exchange, data.buy_price))
        .line("Продажа", format_args!("{} @ {}", data.sell_exchange, data.sell_price))
        .line("Количество", format_args!("{} {}", data.quantity, base))
        .finish()
}

pub fn format_execution(data: &ExecutionData) -> String {
    let base = parse_pair_base(&data.pair);
    let amount = |value: Decimal| format!("{} {}", value, base);

    let message = match data.outcome {
        ExecutionOutcome::Completed => Message::new("✅ *Сделка выполнена*")
            .line("Куплено и продано", amount(data.bought))
            .line("Оценка прибыли", format_args!("*{:.2}*", data.estimated_profit)),
        ExecutionOutcome::NoFill => {
            Message::new("➖ *Покупка не исполнена*").text("Ордер на покупку отменён")
        }
        ExecutionOutcome::BuyBelowMinimum => Message::new("⚠️ *Покупка ниже минимума*")
            .line("Куплено", format_args!("{}, не продано", amount(data.bought))),
        ExecutionOutcome::SellBelowMinimum => Message::new("⚠️ *Остаток ниже минимума*")
            .line("Куплено", amount(data.bought))
            .line("Продано", amount(data.sold)),
        ExecutionOutcome::StopLossPlaced => {
            let stop = data
                .stop_loss
                .as_ref()
                .map(|s| format!("{} @ {}", amount(s.amount), s.price))
                .unwrap_or_else(|| "нет".to_string());
            Message::new("🛡 *Выставлен стоп-лосс*")
                .line("Куплено", amount(data.bought))
                .line("Продано", amount(data.sold))
                .line("Стоп-лосс", stop)
        }
    };

    message
        .line("Пара", &data.pair)
        .text(format_args!("{} → {}", data.buy_exchange, data.sell_exchange))
        .line("Время исполнения", format_duration(data.execution_time))
        .finish()
}

pub fn format_balance_alert(data: &BalanceAlertData) -> String {
    Message::new("🪫 *Низкий баланс*")
        .line("Бот", &data.bot_name)
        .line("Биржа", &data.exchange)
        .line("Актив", &data.asset)
        .line("Баланс", format_args!("*{}* (порог {})", data.balance, data.threshold))
        .finish()
}

pub fn format_error(data: &ErrorData) -> String {
    let message = Message::new("⚠️ *Ошибка*")
        .line("Компонент", &data.component)
        .line("Сообщение", &data.message);

    let message = match data.error {
        Some(ref error) => message.line("Ошибка", error),
        None => message,
    };
    message.finish()
}

pub fn format_startup(data: &StartupData) -> String {
    Message::new("🤖 *Бот запущен*")
        .line("Версия", &data.version)
        .line("Режим", mode_label(data.dry_run))
        .line("Биржи", data.exchanges.join(", "))
        .line("Пара", &data.pair)
        .finish()
}

pub fn format_shutdown(data: &ShutdownData) -> String {
    let status = if data.graceful { "✅ Graceful" } else { "⚠️ Forced" };

    Message::new("🛑 *Бот остановлен*")
        .line("Причина", &data.reason)
        .line("Статус", status)
        .line("Время работы", format_duration(data.uptime))
        .finish()
}

pub fn format_overview(data: &OverviewData) -> String {
    Message::new(&format!("📊 *Обзор торговли* {}", mode_label(data.dry_run)))
        .line("⏱ Время работы", format_duration(data.uptime))
        .line("🔄 Циклов детекции", add_thousand_separators(data.detection_cycles))
        .gap()
        .line("📈 Обнаружено возможностей", data.opportunities_detected)
        .line("▶️ Запущено сделок", data.executions)
        .line("✅ Завершено", data.completed)
        .line("🛡 Стоп-лоссов", data.stop_losses)
        .line("❌ Неудачных", data.failed)
        .gap()
        .line("💰 Оценка прибыли", format_args!("*{:.2}*", data.total_profit))
        .finish()
}

pub fn format_event(event: &Event) -> String {
    match &event.data {
        EventData::Opportunity(data) => format_opportunity(data),
        EventData::Execution(data) => format_execution(data),
        EventData::BalanceAlert(data) => format_balance_alert(data),
        EventData::Error(data) => format_error(data),
        EventData::Startup(data) => format_startup(data),
        EventData::Shutdown(data) => format_shutdown(data),
        EventData::Overview(data) => format_overview(data),
    }
}

// === Вспомогательные функции ===

/// Извлекает базовую валюту из пары (например, "BTC" из "BTC/USDT")
fn parse_pair_base(pair: &str) -> &str {
    pair.split('/').next().unwrap_or(pair)
}

/// Преобразует пару в формат хэштега (например, "BTC/USDT" -> "BTC\_USDT")
/// Underscore escaped for Telegram Markdown compatibility
fn format_pair_tag(pair: &str) -> String {
    pair.replace('/', "\\_")
}

/// Форматирует длительность
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{}с", secs)
    } else if secs < 3600 {
        format!("{}м {}с", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}ч {}м", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}д {}ч", secs / 86400, (secs % 86400) / 3600)
    }
}

/// Добавляет разделители тысяч
fn add_thousand_separators(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
