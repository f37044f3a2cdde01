//! Change notification delivery.
//!
//! Messages are addressed by routing key (`"queue.subqueue"`). The Telegram
//! notifier maps each key to a chat; keys without a chat are skipped.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::TelegramConfig;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Errors that can occur while delivering a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("no bot token configured")]
    MissingToken,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected with {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Delivers a formatted message to the destination for a routing key.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, routing_key: &str, message: &str) -> Result<(), NotifyError>;
}

/// Body of a Telegram `sendMessage` call.
#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

/// Sends notifications through the Telegram Bot API.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    channels: BTreeMap<String, i64>,
    timeout: Duration,
    deliver: bool,
}

impl TelegramNotifier {
    /// With `deliver` off, messages are logged and never sent.
    pub fn new(config: &TelegramConfig, deliver: bool) -> Result<Self, NotifyError> {
        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_base: TELEGRAM_API.to_string(),
            bot_token: config.bot_token.clone(),
            channels: config.channels.clone(),
            timeout,
            deliver,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    fn classify(&self, e: reqwest::Error) -> NotifyError {
        if e.is_timeout() {
            NotifyError::Timeout(self.timeout)
        } else {
            NotifyError::Transport(e.without_url().to_string())
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, routing_key: &str, message: &str) -> Result<(), NotifyError> {
        let Some(&chat_id) = self.channels.get(routing_key) else {
            tracing::warn!(routing_key, "no chat configured, skipping");
            return Ok(());
        };

        let headline = message.lines().next().unwrap_or_default();

        if !self.deliver {
            tracing::info!(routing_key, chat_id, headline, "delivery off, not sending");
            return Ok(());
        }
        if self.bot_token.is_empty() {
            return Err(NotifyError::MissingToken);
        }

        let response = self
            .client
            .post(self.endpoint())
            .json(&SendMessage {
                chat_id,
                text: message,
                parse_mode: "HTML",
            })
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        tracing::info!(routing_key, chat_id, headline, "sent");
        Ok(())
    }
}
