//! Telegram Bot API notifier

use super::Notifier;
use crate::data::SubscriberState;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Telegram Bot API base URL
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Configuration for the Telegram notifier
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_url: String,
    pub token: String,
    /// Chat that receives operator messages
    pub operator_chat_id: i64,
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>, operator_chat_id: i64) -> Self {
        Self {
            api_url: TELEGRAM_API_URL.to_string(),
            token: token.into(),
            operator_chat_id,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Sends notifications through a Telegram bot
pub struct TelegramNotifier {
    config: TelegramConfig,
    http: Client,
    subscribers: Arc<RwLock<SubscriberState>>,
}

impl TelegramNotifier {
    pub fn new(
        config: TelegramConfig,
        subscribers: Arc<RwLock<SubscriberState>>,
    ) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            http,
            subscribers,
        })
    }

    async fn send(&self, chat_id: i64, text: &str) {
        let url = format!("{}/bot{}/sendMessage", self.config.api_url, self.config.token);
        let result = self
            .http
            .post(&url)
            .json(&SendMessage { chat_id, text })
            .send()
            .await
            .and_then(|r| r.error_for_status());

        if let Err(e) = result {
            tracing::warn!(chat_id, error = %e, "Failed to deliver Telegram message");
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) {
        tracing::info!(target: "notify", "{}", text);
        let chat_ids: Vec<i64> = self
            .subscribers
            .read()
            .subscribers
            .iter()
            .map(|s| s.chat_id)
            .collect();
        for chat_id in chat_ids {
            self.send(chat_id, text).await;
        }
    }

    async fn notify_operator(&self, text: &str) {
        tracing::warn!(target: "notify", operator = true, "{}", text);
        self.send(self.config.operator_chat_id, text).await;
    }
}
