//! Integration tests for state persistence

use ema_trader::data::{JsonStateStore, PersistedState, StateStore, SubscriberState, SUBSCRIBERS_FILE};
use ema_trader::market::{Symbol, SymbolCodes, SymbolTable};
use rust_decimal_macros::dec;

fn symbol(id: &str) -> Symbol {
    Symbol::new(
        id,
        SymbolCodes {
            order: format!("{}USD", id),
            data: format!("{}USD", id),
            balance: format!("X{}", id),
        },
        2,
    )
}

#[tokio::test]
async fn test_saved_state_merges_into_configured_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStateStore::new(dir.path().join("nested"));

    let running = SymbolTable::new(vec![symbol("BTC"), symbol("DOGE")]).unwrap();
    running.apply_indicator("BTC", dec!(100), dec!(101));
    running.record_change_pct("BTC", dec!(2.5));
    let mut subscribers = SubscriberState::default();
    subscribers.add(77);
    store
        .save(&PersistedState {
            symbols: running.snapshot(),
            subscribers,
        })
        .await
        .unwrap();

    // DOGE was dropped from the configuration since
    let configured = SymbolTable::new(vec![symbol("BTC"), symbol("ETH")]).unwrap();
    let loaded = store.load().await.unwrap();
    assert_eq!(configured.restore(&loaded.symbols), 1);

    let btc = configured.get("BTC").unwrap();
    assert_eq!(btc.indicator.fast_ema, Some(dec!(100)));
    assert_eq!(btc.last_24h_change_pct, Some(dec!(2.5)));
    assert_eq!(configured.get("ETH").unwrap().indicator.fast_ema, None);
    assert!(loaded.subscribers.contains(77));

    let raw = std::fs::read_to_string(dir.path().join("nested").join(SUBSCRIBERS_FILE)).unwrap();
    let raw: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(raw["subscribers"][0]["chatId"], 77);
}
