//! Keepalive tests for the raw WebSocket client

use crate::common::{next_event, silent_ws_server, ws_server, ServerAction, ServerEvent};
use ema_trader::ws::{WsClient, WsConfig, WsError, WsMessage};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

async fn next_message(rx: &mut mpsc::Receiver<WsMessage>) -> WsMessage {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for client event")
        .expect("client stopped")
}

#[tokio::test]
async fn test_server_ping_gets_matching_pong() {
    let (url, actions, mut events) = ws_server().await;
    let client = WsClient::new(WsConfig::new(url));
    let token = CancellationToken::new();
    let (mut rx, _tx) = client.connect(token.clone());
    assert_eq!(next_message(&mut rx).await, WsMessage::Connected);

    actions.send(ServerAction::Ping(b"keepalive".to_vec())).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        ServerEvent::Pong(b"keepalive".to_vec())
    );

    // Still the same connection afterwards
    actions.send(ServerAction::Send("after".into())).unwrap();
    assert_eq!(next_message(&mut rx).await, WsMessage::Text("after".into()));
    token.cancel();
}

#[tokio::test]
async fn test_missing_pong_reconnects() {
    let (url, mut accepted) = silent_ws_server().await;
    let ping = Duration::from_millis(50);
    let pong = Duration::from_millis(50);
    let client = WsClient::new(
        WsConfig::new(url)
            .keepalive(ping, pong)
            .with_backoff(Duration::from_millis(10), Duration::from_millis(10)),
    );
    let token = CancellationToken::new();
    let started = Instant::now();
    let (mut rx, _tx) = client.connect(token.clone());

    assert_eq!(next_message(&mut rx).await, WsMessage::Connected);
    accepted.recv().await.unwrap();

    match next_message(&mut rx).await {
        WsMessage::Reconnecting {
            attempt,
            delay,
            reason,
        } => {
            assert_eq!(attempt, 1);
            assert_eq!(delay, Duration::from_millis(10));
            assert_eq!(reason, WsError::PongTimeout.to_string());
        }
        other => panic!("expected reconnect, got {:?}", other),
    }
    assert!(started.elapsed() >= ping + pong);

    // A fresh connection follows the backoff
    assert_eq!(next_message(&mut rx).await, WsMessage::Connected);
    tokio::time::timeout(Duration::from_secs(5), accepted.recv())
        .await
        .unwrap()
        .unwrap();
    token.cancel();
}
