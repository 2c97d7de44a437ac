//! Notification module
//!
//! Human-readable messages to subscribers (`notify`) and to the operator
//! (`notify_operator`). Delivery is best effort: failures are logged and never
//! surface to the trading path.

mod telegram;

pub use telegram::{TelegramConfig, TelegramNotifier};

use async_trait::async_trait;

/// Trait for notification channels
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Broadcast to every subscriber
    async fn notify(&self, text: &str);
    /// Send to the operator only
    async fn notify_operator(&self, text: &str);
}

/// Notifier that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) {
        tracing::info!(target: "notify", "{}", text);
    }

    async fn notify_operator(&self, text: &str) {
        tracing::warn!(target: "notify", operator = true, "{}", text);
    }
}
