//! Shared fixtures for integration tests

use async_trait::async_trait;
use ema_trader::exchange::{Balance, ExchangeApi, ExchangeError, Order, OrderResult};
use ema_trader::notify::Notifier;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

/// Exchange with a fixed balance that records orders
pub struct ScriptedExchange {
    balance: Balance,
    orders: Mutex<Vec<Order>>,
    order_delay: Duration,
}

impl ScriptedExchange {
    pub fn new(balance: &[(&str, Decimal)]) -> Self {
        let map: HashMap<String, Decimal> = balance
            .iter()
            .map(|(code, amount)| (code.to_string(), *amount))
            .collect();
        Self {
            balance: Balance::from(map),
            orders: Mutex::new(Vec::new()),
            order_delay: Duration::ZERO,
        }
    }

    /// Hold every order this long before it is accepted
    pub fn with_order_delay(mut self, delay: Duration) -> Self {
        self.order_delay = delay;
        self
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().clone()
    }
}

#[async_trait]
impl ExchangeApi for ScriptedExchange {
    async fn fetch_historical_closes(
        &self,
        pair: &str,
        _interval_minutes: u32,
    ) -> Result<Vec<Decimal>, ExchangeError> {
        Err(ExchangeError::DataUnavailable(format!("no candles for {}", pair)))
    }

    async fn fetch_balance(&self) -> Result<Balance, ExchangeError> {
        Ok(self.balance.clone())
    }

    async fn place_order(&self, order: &Order) -> Result<OrderResult, ExchangeError> {
        tokio::time::sleep(self.order_delay).await;
        let mut orders = self.orders.lock();
        orders.push(order.clone());
        Ok(OrderResult {
            txids: vec![format!("O{}", orders.len())],
            description: None,
        })
    }
}

#[derive(Default)]
pub struct CollectingNotifier {
    pub broadcast: Mutex<Vec<String>>,
    pub operator: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(&self, text: &str) {
        self.broadcast.lock().push(text.to_string());
    }

    async fn notify_operator(&self, text: &str) {
        self.operator.lock().push(text.to_string());
    }
}

/// What a test server saw from its client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Received(String),
    Pong(Vec<u8>),
    Closed(Option<CloseCode>),
}

/// Instruction for a test server connection
#[derive(Debug, Clone)]
pub enum ServerAction {
    Send(String),
    Ping(Vec<u8>),
    Close(CloseCode),
}

/// Local WebSocket server accepting one connection at a time.
///
/// Returns its URL, a sender for actions on the current connection, and a
/// receiver of client events.
pub async fn ws_server() -> (
    String,
    mpsc::UnboundedSender<ServerAction>,
    mpsc::UnboundedReceiver<ServerEvent>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<ServerAction>();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(socket) = tokio_tungstenite::accept_async(stream).await else {
                continue;
            };
            let (mut write, mut read) = socket.split();
            loop {
                tokio::select! {
                    action = action_rx.recv() => match action {
                        Some(ServerAction::Send(text)) => {
                            let _ = write.send(Message::Text(text)).await;
                        }
                        Some(ServerAction::Ping(payload)) => {
                            let _ = write.send(Message::Ping(payload)).await;
                        }
                        Some(ServerAction::Close(code)) => {
                            let frame = tokio_tungstenite::tungstenite::protocol::CloseFrame {
                                code,
                                reason: "bye".into(),
                            };
                            let _ = write.send(Message::Close(Some(frame))).await;
                        }
                        None => return,
                    },
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            let _ = event_tx.send(ServerEvent::Received(text));
                        }
                        Some(Ok(Message::Pong(payload))) => {
                            let _ = event_tx.send(ServerEvent::Pong(payload));
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let _ = event_tx.send(ServerEvent::Closed(frame.map(|f| f.code)));
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    },
                }
            }
        }
    });

    (url, action_tx, event_rx)
}

/// Server that completes the handshake and then never reads, so client
/// pings go unanswered. Yields once per accepted connection.
pub async fn silent_ws_server() -> (String, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            if let Ok(socket) = tokio_tungstenite::accept_async(stream).await {
                held.push(socket);
                let _ = accepted_tx.send(());
            }
        }
    });

    (url, accepted_rx)
}

/// Next server event, failing the test after a few seconds
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for server event")
        .expect("server stopped")
}

pub fn ticker(pair: &str, bid: &str, ask: &str) -> String {
    format!(
        r#"{{"channel":"ticker","type":"update","data":[{{"symbol":"{}","bid":{},"bid_qty":1.0,"ask":{},"ask_qty":1.0,"last":{},"volume":10.0,"vwap":{},"low":{},"high":{},"change":-10.0,"change_pct":-0.5}}]}}"#,
        pair, bid, ask, bid, bid, bid, ask
    )
}
