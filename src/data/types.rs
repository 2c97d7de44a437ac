//! Persisted state types

use crate::market::Symbol;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One notification recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    #[serde(rename = "chatId")]
    pub chat_id: i64,
}

/// Notification recipients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberState {
    #[serde(default)]
    pub subscribers: Vec<Subscriber>,
}

impl SubscriberState {
    /// Add `chat_id`; returns false when already subscribed
    pub fn add(&mut self, chat_id: i64) -> bool {
        if self.contains(chat_id) {
            return false;
        }
        self.subscribers.push(Subscriber { chat_id });
        true
    }

    /// Remove `chat_id`; returns false when it was not subscribed
    pub fn remove(&mut self, chat_id: i64) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.chat_id != chat_id);
        self.subscribers.len() != before
    }

    pub fn contains(&self, chat_id: i64) -> bool {
        self.subscribers.iter().any(|s| s.chat_id == chat_id)
    }
}

/// Everything saved between runs
#[derive(Debug, Clone, Default)]
pub struct PersistedState {
    pub symbols: Vec<Symbol>,
    pub subscribers: SubscriberState,
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
