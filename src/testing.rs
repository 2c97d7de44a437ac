//! Test doubles shared by unit tests

use crate::exchange::{Balance, ExchangeApi, ExchangeError, Order, OrderResult};
use crate::market::{Symbol, SymbolCodes, SymbolTable};
use crate::notify::Notifier;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted exchange
#[derive(Default)]
pub struct MockExchange {
    closes: Mutex<HashMap<String, Result<Vec<Decimal>, ExchangeError>>>,
    balance: Mutex<Balance>,
    balance_errors: Mutex<VecDeque<ExchangeError>>,
    order_errors: Mutex<VecDeque<ExchangeError>>,
    orders: Mutex<Vec<Order>>,
    order_delay: Mutex<Option<Duration>>,
    balance_calls: AtomicUsize,
}

impl MockExchange {
    pub fn set_closes(&self, pair: &str, closes: &[&str]) {
        let parsed = closes.iter().map(|c| Decimal::from_str(c).unwrap()).collect();
        self.closes.lock().insert(pair.to_string(), Ok(parsed));
    }

    pub fn set_closes_error(&self, pair: &str, err: ExchangeError) {
        self.closes.lock().insert(pair.to_string(), Err(err));
    }

    pub fn set_balance(&self, entries: &[(&str, &str)]) {
        let map: HashMap<String, Decimal> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), Decimal::from_str(v).unwrap()))
            .collect();
        *self.balance.lock() = Balance::from(map);
    }

    pub fn push_balance_error(&self, err: ExchangeError) {
        self.balance_errors.lock().push_back(err);
    }

    pub fn push_order_error(&self, err: ExchangeError) {
        self.order_errors.lock().push_back(err);
    }

    pub fn set_order_delay(&self, delay: Duration) {
        *self.order_delay.lock() = Some(delay);
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().clone()
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeApi for MockExchange {
    async fn fetch_historical_closes(
        &self,
        pair: &str,
        _interval_minutes: u32,
    ) -> Result<Vec<Decimal>, ExchangeError> {
        self.closes
            .lock()
            .get(pair)
            .cloned()
            .unwrap_or_else(|| Err(ExchangeError::DataUnavailable(format!("no data for {}", pair))))
    }

    async fn fetch_balance(&self) -> Result<Balance, ExchangeError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.balance_errors.lock().pop_front() {
            return Err(err);
        }
        Ok(self.balance.lock().clone())
    }

    async fn place_order(&self, order: &Order) -> Result<OrderResult, ExchangeError> {
        let delay = *self.order_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.order_errors.lock().pop_front() {
            return Err(err);
        }
        self.orders.lock().push(order.clone());
        Ok(OrderResult {
            txids: vec![format!("TX-{}", self.orders.lock().len())],
            description: None,
        })
    }
}

/// Notifier that keeps every message
#[derive(Default)]
pub struct RecordingNotifier {
    broadcast: Mutex<Vec<String>>,
    operator: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.broadcast.lock().clone()
    }

    pub fn operator_messages(&self) -> Vec<String> {
        self.operator.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) {
        self.broadcast.lock().push(text.to_string());
    }

    async fn notify_operator(&self, text: &str) {
        self.operator.lock().push(text.to_string());
    }
}

/// Flat symbol with codes derived from `id`
pub fn symbol(id: &str) -> Symbol {
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

pub fn table(ids: &[&str]) -> SymbolTable {
    SymbolTable::new(ids.iter().map(|id| symbol(id)).collect()).unwrap()
}
