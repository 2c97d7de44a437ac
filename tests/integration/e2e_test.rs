//! End-to-end integration tests: crossover to order

use crate::common::{
    next_event, ticker, ws_server, CollectingNotifier, ScriptedExchange, ServerAction, ServerEvent,
};
use chrono::Utc;
use ema_trader::balance::BalanceTracker;
use ema_trader::bot::{Bot, Services};
use ema_trader::config::Config;
use ema_trader::data::{JsonStateStore, SubscriberState, MARKET_DATA_FILE};
use ema_trader::exchange::OrderSide;
use ema_trader::execution::{ExecutorConfig, TradeExecutor};
use ema_trader::feed::Tick;
use ema_trader::market::{Symbol, SymbolCodes, SymbolTable};
use ema_trader::strategy::{DecisionEngine, EngineConfig};
use parking_lot::RwLock;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

fn btc() -> Symbol {
    Symbol::new(
        "BTC",
        SymbolCodes {
            order: "BTCUSD".into(),
            data: "XBTUSD".into(),
            balance: "XXBT".into(),
        },
        1,
    )
}

async fn wait_for_orders(exchange: &ScriptedExchange, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while exchange.orders().len() < count {
        assert!(Instant::now() < deadline, "timed out waiting for orders");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_bullish_crossover_places_one_buy() {
    let exchange = Arc::new(ScriptedExchange::new(&[("ZUSD", dec!(1000)), ("XXBT", dec!(0))]));
    let notifier = Arc::new(CollectingNotifier::default());
    let table = SymbolTable::new(vec![btc()]).unwrap();
    let balances = Arc::new(BalanceTracker::new(exchange.clone(), table.clone()));
    balances.refresh().await.unwrap();

    // Two refresh cycles: below, then above
    table.apply_indicator("BTC", dec!(9), dec!(10));
    table.apply_indicator("BTC", dec!(11), dec!(10));

    let executor = Arc::new(TradeExecutor::new(
        exchange.clone(),
        balances,
        table.clone(),
        notifier.clone(),
        ExecutorConfig::default(),
    ));
    let engine = DecisionEngine::new(table, executor, EngineConfig::default());

    let tick = Tick {
        symbol: "BTC".into(),
        bid: dec!(49990),
        ask: dec!(50000),
        change_pct: dec!(1.2),
        received_at: Utc::now(),
    };
    let signal = engine.on_tick(&tick, Instant::now()).expect("buy signal");
    assert_eq!(signal.side, OrderSide::Buy);

    // Duplicate tick is debounced
    assert!(engine.on_tick(&tick, Instant::now()).is_none());

    wait_for_orders(&exchange, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let orders = exchange.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].pair, "BTCUSD");
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert_eq!(orders[0].price, dec!(50025));
    assert_eq!(orders[0].volume, dec!(1000) / dec!(50000));
    assert_eq!(notifier.broadcast.lock().len(), 1);
}

/// Bot trading BTC against a local stream, saving into `dir`
fn stream_bot(
    url: &str,
    dir: &std::path::Path,
    exchange: Arc<ScriptedExchange>,
    notifier: Arc<CollectingNotifier>,
) -> Bot {
    let toml = format!(
        r#"
        [exchange]
        ws_url = "{}"

        [stream]
        reconnect_base_secs = 1
        reconnect_cap_secs = 1

        [persistence]
        state_dir = "{}"

        [[symbols]]
        id = "BTC"
        order_code = "BTCUSD"
        data_code = "XBTUSD"
        balance_code = "XXBT"
        price_decimals = 1
        "#,
        url,
        dir.display()
    );
    let config = Config::from_toml(&toml).unwrap();
    let bot = Bot::new(
        config,
        Services {
            exchange,
            notifier,
            store: Arc::new(JsonStateStore::new(dir)),
            subscribers: Arc::new(RwLock::new(SubscriberState::default())),
        },
    )
    .unwrap();

    // Candle fetches fail in this exchange, so these values survive the
    // refresh cycle that runs at start-up
    bot.table().apply_indicator("BTC", dec!(9), dec!(10));
    bot.table().apply_indicator("BTC", dec!(11), dec!(10));
    bot
}

async fn expect_ticker_subscription(events: &mut tokio::sync::mpsc::UnboundedReceiver<ServerEvent>) {
    match next_event(events).await {
        ServerEvent::Received(text) => {
            assert!(text.contains(r#""channel":"ticker""#), "{}", text);
            assert!(text.contains("BTC/USD"), "{}", text);
        }
        other => panic!("expected subscription, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bot_trades_from_stream_and_saves_on_shutdown() {
    let (url, actions, mut events) = ws_server().await;
    let dir = tempfile::tempdir().unwrap();
    let exchange = Arc::new(ScriptedExchange::new(&[("ZUSD", dec!(1000))]));
    let notifier = Arc::new(CollectingNotifier::default());
    let bot = stream_bot(&url, dir.path(), exchange.clone(), notifier.clone());

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown = async {
        let _ = shutdown_rx.await;
    };

    let driver = async {
        expect_ticker_subscription(&mut events).await;
        actions
            .send(ServerAction::Send(ticker("BTC/USD", "49990", "50000")))
            .unwrap();
        wait_for_orders(&exchange, 1).await;

        let _ = shutdown_tx.send(());
        assert_eq!(
            next_event(&mut events).await,
            ServerEvent::Closed(Some(CloseCode::Normal))
        );
    };

    let (result, ()) = tokio::join!(bot.run(shutdown), driver);
    result.unwrap();

    let orders = exchange.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].price, dec!(50025));
    assert_eq!(orders[0].volume, dec!(0.02));

    let saved = std::fs::read_to_string(dir.path().join(MARKET_DATA_FILE)).unwrap();
    let saved: serde_json::Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(saved["BTC"]["codes"]["order"], "BTCUSD");
    assert!(notifier.operator.lock().is_empty());
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_order() {
    let (url, actions, mut events) = ws_server().await;
    let dir = tempfile::tempdir().unwrap();
    let exchange = Arc::new(
        ScriptedExchange::new(&[("ZUSD", dec!(1000))]).with_order_delay(Duration::from_millis(500)),
    );
    let notifier = Arc::new(CollectingNotifier::default());
    let bot = stream_bot(&url, dir.path(), exchange.clone(), notifier.clone());

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown = async {
        let _ = shutdown_rx.await;
    };

    let driver = async {
        expect_ticker_subscription(&mut events).await;
        actions
            .send(ServerAction::Send(ticker("BTC/USD", "49990", "50000")))
            .unwrap();

        // Signal dispatched, order still held by the exchange
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(exchange.orders().is_empty());
        let _ = shutdown_tx.send(());
    };

    let (result, ()) = tokio::join!(bot.run(shutdown), driver);
    result.unwrap();

    assert_eq!(exchange.orders().len(), 1);
    assert_eq!(notifier.broadcast.lock().len(), 1);
    assert!(notifier.operator.lock().is_empty());
}
