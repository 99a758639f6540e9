use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config;
use crate::notification::{Event, EventType, NotificationError, Notifier, format_event};

const TELEGRAM_API_URL: &str = "https://api.telegram.org/bot";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_MESSAGE_LENGTH: usize = 4096;
const ASYNC_QUEUE_SIZE: usize = 100;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Конфигурация Telegram notifier
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Токен бота от BotFather
    pub bot_token: String,
    /// ID чата для отправки уведомлений
    pub chat_id: String,
    /// Опциональный ID чата для ошибок и предупреждений о балансе
    pub error_chat_id: Option<String>,
    /// Включить уведомления о возможностях
    pub notify_opportunities: bool,
    /// Включить уведомления о выполнении
    pub notify_executions: bool,
    /// Включить уведомления об ошибках
    pub notify_errors: bool,
    /// Включить периодические обзоры
    pub notify_overview: bool,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            error_chat_id: None,
            notify_opportunities: true,
            notify_executions: true,
            notify_errors: true,
            notify_overview: true,
        }
    }

    pub fn with_error_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        let chat_id = chat_id.into();
        self.error_chat_id = if chat_id.is_empty() { None } else { Some(chat_id) };
        self
    }

    /// Собирает конфигурацию из секции `notification.telegram`
    pub fn from_settings(settings: &config::TelegramConfig) -> Self {
        Self {
            notify_opportunities: settings.notify_opportunities,
            notify_executions: settings.notify_executions,
            notify_errors: settings.notify_errors,
            notify_overview: settings.notify_overview,
            ..Self::new(settings.bot_token.clone(), settings.chat_id.clone())
        }
        .with_error_chat_id(settings.error_chat_id.clone())
    }

    /// Чат для события: ошибки и низкий баланс уходят в отдельный чат, если он задан
    fn chat_for(&self, event_type: EventType) -> &str {
        match event_type {
            EventType::Error | EventType::BalanceAlert => {
                self.error_chat_id.as_deref().unwrap_or(&self.chat_id)
            }
            _ => &self.chat_id,
        }
    }

    fn is_enabled(&self, event_type: EventType) -> bool {
        match event_type {
            EventType::Startup | EventType::Shutdown | EventType::BalanceAlert => true,
            EventType::Opportunity => self.notify_opportunities,
            EventType::Execution => self.notify_executions,
            EventType::Error => self.notify_errors,
            EventType::Overview => self.notify_overview,
        }
    }
}

/// HTTP-клиент Bot API
#[derive(Clone)]
struct BotApi {
    http: reqwest::Client,
    url: String,
}

impl BotApi {
    fn new(bot_token: &str) -> Result<Self, NotificationError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| NotificationError::new(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: format!("{}{}/sendMessage", TELEGRAM_API_URL, bot_token),
        })
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotificationError> {
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": truncate_message(text),
            "parse_mode": "Markdown"
        });

        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::new(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotificationError::new(format!(
            "Telegram API error: {} - {}",
            status, body
        )))
    }
}

/// Уведомления через Telegram Bot API.
///
/// `send_async` кладёт событие в ограниченную очередь; её разбирает фоновый
/// воркер. `close` закрывает очередь и ждёт, пока воркер её допишет.
pub struct TelegramNotifier {
    config: Arc<TelegramConfig>,
    api: BotApi,
    sender: StdMutex<Option<mpsc::Sender<Event>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self, NotificationError> {
        if config.bot_token.is_empty() {
            return Err(NotificationError::new("bot_token is required"));
        }
        if config.chat_id.is_empty() {
            return Err(NotificationError::new("chat_id is required"));
        }

        let config = Arc::new(config);
        let api = BotApi::new(&config.bot_token)?;
        let (sender, receiver) = mpsc::channel(ASYNC_QUEUE_SIZE);
        let worker = tokio::spawn(drain_queue(receiver, Arc::clone(&config), api.clone()));

        Ok(Self {
            config,
            api,
            sender: StdMutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }
}

async fn drain_queue(
    mut receiver: mpsc::Receiver<Event>,
    config: Arc<TelegramConfig>,
    api: BotApi,
) {
    while let Some(event) = receiver.recv().await {
        let chat_id = config.chat_for(event.event_type);
        if let Err(e) = api.send_message(chat_id, &format_event(&event)).await {
            error!(error = %e, event_type = %event.event_type, "Failed to send Telegram message");
        }
    }
}

/// Обрезает сообщение до лимита Telegram, не разрывая символы UTF-8
fn truncate_message(text: &str) -> &str {
    if text.len() <= MAX_MESSAGE_LENGTH {
        return text;
    }
    let mut end = MAX_MESSAGE_LENGTH;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, event: &Event) -> Result<(), NotificationError> {
        if !self.is_enabled(event.event_type) {
            return Ok(());
        }

        let chat_id = self.config.chat_for(event.event_type);
        self.api.send_message(chat_id, &format_event(event)).await
    }

    fn send_async(&self, event: Event) {
        if !self.is_enabled(event.event_type) {
            return;
        }

        let Ok(guard) = self.sender.lock() else {
            return;
        };
        match guard.as_ref() {
            Some(sender) => {
                if let Err(e) = sender.try_send(event) {
                    warn!(error = %e, "Telegram queue rejected message");
                }
            }
            None => debug!(event_type = %event.event_type, "Telegram notifier closed"),
        }
    }

    fn is_enabled(&self, event_type: EventType) -> bool {
        self.config.is_enabled(event_type)
    }

    async fn close(&self) -> Result<(), NotificationError> {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }

        let Some(worker) = self.worker.lock().await.take() else {
            return Ok(());
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, worker).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(NotificationError::new(format!("Telegram worker failed: {}", e))),
            Err(_) => Err(NotificationError::new("Telegram queue not drained in time")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_char_boundary() {
        let text = "ж".repeat(MAX_MESSAGE_LENGTH);
        let truncated = truncate_message(&text);
        assert!(truncated.len() <= MAX_MESSAGE_LENGTH);
        assert!(truncated.chars().all(|c| c == 'ж'));
    }

    #[test]
    fn test_short_message_untouched() {
        assert_eq!(truncate_message("ok"), "ok");
    }

    #[test]
    fn test_alerts_go_to_error_chat() {
        let config = TelegramConfig::new("token", "main").with_error_chat_id("errors");
        assert_eq!(config.chat_for(EventType::Error), "errors");
        assert_eq!(config.chat_for(EventType::BalanceAlert), "errors");
        assert_eq!(config.chat_for(EventType::Execution), "main");
    }

    #[test]
    fn test_empty_error_chat_falls_back() {
        let config = TelegramConfig::new("token", "main").with_error_chat_id("");
        assert_eq!(config.chat_for(EventType::Error), "main");
    }

    #[test]
    fn test_from_settings_copies_flags() {
        let settings = config::TelegramConfig {
            enabled: true,
            bot_token: "token".to_string(),
            chat_id: "main".to_string(),
            error_chat_id: String::new(),
            notify_opportunities: false,
            notify_executions: true,
            notify_errors: false,
            notify_overview: true,
            overview_interval: Duration::from_secs(3600),
        };
        let config = TelegramConfig::from_settings(&settings);

        assert!(!config.is_enabled(EventType::Opportunity));
        assert!(config.is_enabled(EventType::Execution));
        assert!(!config.is_enabled(EventType::Error));
        assert!(config.is_enabled(EventType::BalanceAlert));
        assert!(config.is_enabled(EventType::Startup));
    }

    #[tokio::test]
    async fn test_close_drains_empty_queue_once() {
        let notifier = TelegramNotifier::new(TelegramConfig::new("token", "main")).unwrap();

        assert!(notifier.close().await.is_ok());
        // Queue is gone: late events are dropped, a second close is a no-op.
        notifier.send_async(Event::new(crate::notification::ErrorData {
            component: "bot".to_string(),
            message: "late".to_string(),
            error: None,
        }));
        assert!(notifier.close().await.is_ok());
    }

    #[test]
    fn test_new_requires_token() {
        let result = TelegramNotifier::new(TelegramConfig::new("", "main"));
        assert!(result.is_err());
    }
}
