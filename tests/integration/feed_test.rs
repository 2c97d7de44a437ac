//! Integration tests for the ticker feed against a local WebSocket server

use crate::common::{next_event, ticker, ws_server, ServerAction, ServerEvent};
use ema_trader::feed::{KrakenTickerFeed, PriceFeed, StreamState};
use ema_trader::ws::WsConfig;
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;

fn feed(url: &str) -> KrakenTickerFeed {
    let config = WsConfig::new(url)
        .with_backoff(Duration::from_millis(20), Duration::from_millis(50));
    KrakenTickerFeed::new(
        config,
        vec!["BTC/USD".to_string(), "ETH/USD".to_string()],
        CancellationToken::new(),
    )
}

async fn expect_subscription(events: &mut tokio::sync::mpsc::UnboundedReceiver<ServerEvent>) {
    // The close handshake of a previous connection may still be in flight
    let text = loop {
        match next_event(events).await {
            ServerEvent::Received(text) => break text,
            ServerEvent::Closed(_) | ServerEvent::Pong(_) => continue,
        }
    };
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["method"], "subscribe");
    assert_eq!(value["params"]["channel"], "ticker");
    assert_eq!(value["params"]["event_trigger"], "trades");
    assert_eq!(value["params"]["symbol"][0], "BTC/USD");
    assert_eq!(value["params"]["symbol"][1], "ETH/USD");
}

#[tokio::test]
async fn test_subscribes_and_streams_ticks() {
    let (url, actions, mut events) = ws_server().await;
    let feed = feed(&url);
    let mut state = feed.state();
    let mut ticks = feed.subscribe().await.unwrap();

    expect_subscription(&mut events).await;

    actions
        .send(ServerAction::Send(r#"{"channel":"heartbeat"}"#.into()))
        .unwrap();
    actions.send(ServerAction::Send("not json".into())).unwrap();
    actions
        .send(ServerAction::Send(ticker("ETH/USD", "3000.5", "3001")))
        .unwrap();

    let tick = tokio::time::timeout(Duration::from_secs(5), ticks.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tick.symbol, "ETH");
    assert_eq!(tick.bid, dec!(3000.5));
    assert_eq!(tick.ask, dec!(3001));
    assert_eq!(tick.change_pct, dec!(-0.5));

    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == StreamState::Streaming))
        .await
        .unwrap()
        .unwrap();

    feed.disconnect();
    assert_eq!(
        next_event(&mut events).await,
        ServerEvent::Closed(Some(CloseCode::Normal))
    );
}

#[tokio::test]
async fn test_normal_server_close_ends_stream() {
    let (url, actions, mut events) = ws_server().await;
    let feed = feed(&url);
    let mut ticks = feed.subscribe().await.unwrap();
    expect_subscription(&mut events).await;

    actions.send(ServerAction::Close(CloseCode::Normal)).unwrap();

    let end = tokio::time::timeout(Duration::from_secs(5), ticks.recv())
        .await
        .unwrap();
    assert!(end.is_none());
    assert_eq!(*feed.state().borrow(), StreamState::Disconnected);
}

#[tokio::test]
async fn test_abnormal_close_reconnects_and_resubscribes() {
    let (url, actions, mut events) = ws_server().await;
    let feed = feed(&url);
    let mut ticks = feed.subscribe().await.unwrap();
    expect_subscription(&mut events).await;

    actions.send(ServerAction::Close(CloseCode::Away)).unwrap();
    expect_subscription(&mut events).await;

    actions
        .send(ServerAction::Send(ticker("BTC/USD", "50000", "50001")))
        .unwrap();
    let tick = tokio::time::timeout(Duration::from_secs(5), ticks.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tick.symbol, "BTC");

    feed.disconnect();
}
