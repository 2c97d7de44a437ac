//! Kraken WebSocket v2 ticker feed

use super::{FeedError, PriceFeed, StreamState, Tick};
use crate::market::base_of;
use crate::notify::{LogNotifier, Notifier};
use crate::telemetry::{increment, CounterMetric};
use crate::ws::{WsClient, WsConfig, WsMessage};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Channel name of ticker messages
pub const TICKER_CHANNEL: &str = "ticker";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    symbol: String,
    bid: Decimal,
    ask: Decimal,
    change_pct: Decimal,
}

/// Ticker feed for a fixed set of pairs over one WebSocket connection
pub struct KrakenTickerFeed {
    config: WsConfig,
    /// Display pairs, e.g. "BTC/USD"
    pairs: Vec<String>,
    state_tx: watch::Sender<StreamState>,
    token: CancellationToken,
    /// Told when the connection drops
    notifier: Arc<dyn Notifier>,
}

impl KrakenTickerFeed {
    /// Create a feed for `pairs`; cancelling `token` shuts it down
    pub fn new(config: WsConfig, pairs: Vec<String>, token: CancellationToken) -> Self {
        let (state_tx, _) = watch::channel(StreamState::Disconnected);
        Self {
            config,
            pairs,
            state_tx,
            token,
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Report connection loss to the operator through `notifier`
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Watch the connection state
    pub fn state(&self) -> watch::Receiver<StreamState> {
        self.state_tx.subscribe()
    }

    pub fn pairs(&self) -> &[String] {
        &self.pairs
    }

    /// Subscription request naming every pair
    pub fn subscription_message(pairs: &[String]) -> String {
        serde_json::json!({
            "method": "subscribe",
            "params": {
                "channel": TICKER_CHANNEL,
                "symbol": pairs,
                "event_trigger": "trades",
            }
        })
        .to_string()
    }

    /// Parse one stream message.
    ///
    /// Messages for other channels (heartbeats, status, subscription acks)
    /// yield no ticks. A message carrying an `error` field is reported as
    /// [`FeedError::Exchange`].
    pub fn parse_message(text: &str) -> Result<Vec<Tick>, FeedError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| FeedError::Protocol(e.to_string()))?;

        if let Some(error) = envelope.error {
            let message = match error {
                Value::String(s) => s,
                other => other.to_string(),
            };
            return Err(FeedError::Exchange(message));
        }

        if envelope.channel.as_deref() != Some(TICKER_CHANNEL) {
            return Ok(Vec::new());
        }

        let data = envelope
            .data
            .ok_or_else(|| FeedError::Protocol("ticker message without data".into()))?;
        let entries: Vec<TickerEntry> =
            serde_json::from_value(data).map_err(|e| FeedError::Protocol(e.to_string()))?;

        let received_at = Utc::now();
        Ok(entries
            .into_iter()
            .map(|entry| Tick {
                symbol: base_of(&entry.symbol).to_string(),
                bid: entry.bid,
                ask: entry.ask,
                change_pct: entry.change_pct,
                received_at,
            })
            .collect())
    }

    /// Run the message processing loop
    async fn run_message_loop(
        mut ws_rx: mpsc::Receiver<WsMessage>,
        send_tx: mpsc::Sender<String>,
        tick_tx: mpsc::Sender<Tick>,
        state_tx: watch::Sender<StreamState>,
        subscription: String,
        notifier: Arc<dyn Notifier>,
    ) {
        while let Some(msg) = ws_rx.recv().await {
            match msg {
                WsMessage::Text(text) => match Self::parse_message(&text) {
                    Ok(ticks) => {
                        for tick in ticks {
                            state_tx.send_if_modified(|state| {
                                let changed = *state != StreamState::Streaming;
                                *state = StreamState::Streaming;
                                changed
                            });
                            increment(CounterMetric::TicksReceived);
                            if tick_tx.send(tick).await.is_err() {
                                tracing::debug!("Tick receiver dropped, stopping feed");
                                return;
                            }
                        }
                    }
                    Err(FeedError::Exchange(e)) => {
                        tracing::warn!(error = %e, "Ticker stream reported an error");
                    }
                    Err(e) => {
                        increment(CounterMetric::MalformedMessages);
                        tracing::warn!(error = %e, "Discarding ticker message");
                    }
                },
                WsMessage::Connected => {
                    tracing::info!("Kraken ticker feed connected, subscribing");
                    if send_tx.send(subscription.clone()).await.is_err() {
                        tracing::warn!("WebSocket writer gone, cannot subscribe");
                        break;
                    }
                    state_tx.send_replace(StreamState::Subscribed);
                }
                WsMessage::Disconnected => {
                    tracing::warn!("Kraken ticker feed disconnected");
                    break;
                }
                WsMessage::Reconnecting {
                    attempt,
                    delay,
                    reason,
                } => {
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Kraken ticker feed reconnecting..."
                    );
                    state_tx.send_replace(StreamState::Connecting);
                    // Once per outage
                    if attempt == 1 {
                        notifier
                            .notify_operator(&format!(
                                "Ticker stream error: {}. Reconnecting in {}s",
                                reason,
                                delay.as_secs()
                            ))
                            .await;
                    }
                }
                WsMessage::Binary(_) => {
                    // v2 API is JSON text only
                }
            }
        }
        state_tx.send_replace(StreamState::Disconnected);
    }
}

#[async_trait]
impl PriceFeed for KrakenTickerFeed {
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<Tick>> {
        if self.pairs.is_empty() {
            anyhow::bail!("no pairs to subscribe to");
        }

        let (tick_tx, tick_rx) = mpsc::channel(self.config.channel_capacity);
        let subscription = Self::subscription_message(&self.pairs);

        tracing::info!(pairs = ?self.pairs, url = %self.config.url, "Subscribing to Kraken ticker feed");
        self.state_tx.send_replace(StreamState::Connecting);

        let client = WsClient::new(self.config.clone());
        let (ws_rx, send_tx) = client.connect(self.token.clone());
        let state_tx = self.state_tx.clone();
        let notifier = self.notifier.clone();

        tokio::spawn(async move {
            Self::run_message_loop(ws_rx, send_tx, tick_tx, state_tx, subscription, notifier)
                .await;
        });

        Ok(tick_rx)
    }

    fn disconnect(&self) {
        tracing::info!("Closing Kraken ticker feed");
        self.token.cancel();
    }
}
