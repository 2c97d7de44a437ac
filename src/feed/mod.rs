//! Price feed module
//!
//! Live ticker data from Kraken's WebSocket v2 API

mod kraken;
mod types;

pub use kraken::{KrakenTickerFeed, TICKER_CHANNEL};
pub use types::{FeedError, StreamState, Tick};

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Trait for price feed implementations
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Subscribe to ticker updates
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<Tick>>;

    /// Close the stream with a normal status; no reconnect follows
    fn disconnect(&self);
}
