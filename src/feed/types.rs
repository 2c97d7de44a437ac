//! Price feed types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalised ticker update for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Bare symbol id (e.g., "BTC" for "BTC/USD")
    pub symbol: String,
    /// Best bid
    pub bid: Decimal,
    /// Best ask
    pub ask: Decimal,
    /// 24h change in percent
    pub change_pct: Decimal,
    /// Local timestamp when the update was received
    pub received_at: DateTime<Utc>,
}

/// Connection state of the ticker stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    Disconnected,
    Connecting,
    /// Subscription sent, no ticker data yet
    Subscribed,
    /// Ticker data flowing
    Streaming,
}

/// Stream message errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// Message could not be decoded
    #[error("malformed stream message: {0}")]
    Protocol(String),
    /// Message carried an exchange error field
    #[error("stream error: {0}")]
    Exchange(String),
}
