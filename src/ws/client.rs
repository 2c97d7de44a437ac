//! WebSocket client with automatic reconnection

use super::types::{WsConfig, WsError, WsMessage};
use crate::telemetry::{increment, CounterMetric};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Queued outgoing frames
const OUTBOUND_CAPACITY: usize = 256;

/// Reconnecting WebSocket client.
///
/// One client drives one logical connection. Cancelling the token passed to
/// [`WsClient::connect`] closes the socket with status 1000 and ends the
/// task; a close frame with status 1000 from the server also ends it. Any
/// other closure, a stream error or a missed pong reconnects after the
/// configured backoff.
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    /// Spawn the connection task.
    ///
    /// The receiver gets every text frame plus the lifecycle events
    /// (`Connected`, `Reconnecting`, `Disconnected`); the sender queues text
    /// frames for the server.
    pub fn connect(
        &self,
        token: CancellationToken,
    ) -> (mpsc::Receiver<WsMessage>, mpsc::Sender<String>) {
        let (event_tx, event_rx) = mpsc::channel(self.config.channel_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let config = self.config.clone();

        tokio::spawn(async move {
            if let Err(e) = Self::run_connection_loop(config, event_tx, outbound_rx, token).await {
                tracing::error!(error = %e, "WebSocket connection loop failed");
            }
        });

        (event_rx, outbound_tx)
    }

    /// Run the connection loop with automatic reconnection
    async fn run_connection_loop(
        config: WsConfig,
        tx: mpsc::Sender<WsMessage>,
        mut send_rx: mpsc::Receiver<String>,
        token: CancellationToken,
    ) -> Result<(), WsError> {
        // Consecutive failures since the last successful connect
        let mut attempt: u32 = 0;

        loop {
            tracing::info!(url = %config.url, "Connecting to WebSocket");
            let connected = tokio::select! {
                _ = token.cancelled() => break,
                result = connect_async(config.url.as_str()) => result,
            };

            let outcome = match connected {
                Ok((socket, _response)) => {
                    attempt = 0;
                    tracing::info!("WebSocket connected");
                    if tx.send(WsMessage::Connected).await.is_err() {
                        break;
                    }
                    Self::stream(&config, socket, &tx, &mut send_rx, &token).await
                }
                Err(e) => Err(WsError::ConnectionFailed(e.to_string())),
            };

            let err = match outcome {
                Ok(()) => break,
                Err(e) => e,
            };

            attempt += 1;
            if config.backoff.exhausted(attempt) {
                tracing::error!(error = %err, attempt, "Max reconnection attempts reached");
                let _ = tx.send(WsMessage::Disconnected).await;
                return Err(WsError::MaxReconnectsExceeded);
            }

            if tx.is_closed() {
                tracing::info!("Receiver dropped, stopping reconnection");
                break;
            }

            let delay = config.backoff.delay(attempt - 1);
            tracing::warn!(
                error = %err,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "WebSocket connection error, reconnecting..."
            );
            increment(CounterMetric::StreamReconnects);
            let _ = tx
                .send(WsMessage::Reconnecting {
                    attempt,
                    delay,
                    reason: err.to_string(),
                })
                .await;

            tokio::select! {
                _ = token.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        let _ = tx.send(WsMessage::Disconnected).await;
        Ok(())
    }

    /// Pump one connection until it ends.
    ///
    /// `Ok` means the session ended for good (shutdown, normal close, consumer
    /// gone); `Err` asks the caller to reconnect.
    async fn stream(
        config: &WsConfig,
        socket: Socket,
        tx: &mpsc::Sender<WsMessage>,
        send_rx: &mut mpsc::Receiver<String>,
        token: &CancellationToken,
    ) -> Result<(), WsError> {
        let (mut write, mut read) = socket.split();

        let mut ping_interval =
            tokio::time::interval_at(Instant::now() + config.ping_interval, config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Set while a ping is outstanding
        let mut pong_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Shutdown requested, closing WebSocket");
                    close_normally(&mut write).await;
                    return Ok(());
                }

                // Handle incoming messages
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if tx.send(WsMessage::Text(text)).await.is_err() {
                                tracing::debug!("Receiver dropped, closing connection");
                                close_normally(&mut write).await;
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if tx.send(WsMessage::Binary(data)).await.is_err() {
                                tracing::debug!("Receiver dropped, closing connection");
                                close_normally(&mut write).await;
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            pong_deadline = None;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            return match frame {
                                Some(f) if f.code == CloseCode::Normal => {
                                    tracing::info!(reason = %f.reason, "Server closed connection normally");
                                    Ok(())
                                }
                                Some(f) => Err(WsError::AbnormalClose(format!(
                                    "{} {}",
                                    u16::from(f.code),
                                    f.reason
                                ))),
                                None => Err(WsError::AbnormalClose("no status".into())),
                            };
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            return Err(WsError::ConnectionFailed(e.to_string()));
                        }
                        None => {
                            return Err(WsError::ConnectionFailed("Stream ended unexpectedly".into()));
                        }
                    }
                }

                // Handle outgoing messages
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            write.send(Message::Text(text)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        None => {
                            // Sender dropped, close connection
                            close_normally(&mut write).await;
                            return Ok(());
                        }
                    }
                }

                // Send periodic pings
                _ = ping_interval.tick() => {
                    if pong_deadline.is_none() {
                        write.send(Message::Ping(Vec::new())).await
                            .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        pong_deadline = Some(Instant::now() + config.pong_timeout);
                    }
                }

                _ = async move {
                    match pong_deadline {
                        Some(deadline) => sleep_until(deadline).await,
                        None => std::future::pending().await,
                    }
                } => {
                    return Err(WsError::PongTimeout);
                }
            }
        }
    }
}

/// Send a close frame with status 1000, ignoring failures
async fn close_normally<S>(write: &mut S)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "shutdown".into(),
    };
    if let Err(e) = write.send(Message::Close(Some(frame))).await {
        tracing::debug!(error = %e, "Failed to send close frame");
    }
}
