//! Decision engine: ticks plus indicator state in, trade signals out

use super::{crossover_signal, Debouncer};
use crate::exchange::OrderSide;
use crate::feed::Tick;
use crate::market::SymbolTable;
use crate::telemetry::{increment, CounterMetric};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A qualifying crossover for one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeSignal {
    pub symbol: String,
    pub side: OrderSide,
    /// Ask for buys, bid for sells
    pub price: Decimal,
}

/// Receives accepted signals
pub trait SignalHandler: Send + Sync {
    fn on_signal(&self, signal: TradeSignal);
}

/// Decision engine settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub debounce: Duration,
    /// Holdings below this count as flat
    pub flat_epsilon: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            flat_epsilon: Decimal::new(1, 6),
        }
    }
}

/// Turns ticks into trade signals
pub struct DecisionEngine {
    table: SymbolTable,
    handler: Arc<dyn SignalHandler>,
    debouncer: Mutex<Debouncer>,
    flat_epsilon: Decimal,
}

impl DecisionEngine {
    pub fn new(table: SymbolTable, handler: Arc<dyn SignalHandler>, config: EngineConfig) -> Self {
        Self {
            table,
            handler,
            debouncer: Mutex::new(Debouncer::new(config.debounce)),
            flat_epsilon: config.flat_epsilon,
        }
    }

    /// Evaluate one tick; returns the signal handed to the handler, if any
    pub fn on_tick(&self, tick: &Tick, now: Instant) -> Option<TradeSignal> {
        self.table.record_change_pct(&tick.symbol, tick.change_pct);

        let Some(symbol) = self.table.get(&tick.symbol) else {
            tracing::debug!(symbol = %tick.symbol, "Tick for unknown symbol");
            return None;
        };
        // No-op until two refreshes have produced current and previous values
        let ema = symbol.indicator.ema_pair()?;

        let holding = !symbol.is_flat(self.flat_epsilon);
        let side = crossover_signal(&ema, holding)?;
        let price = match side {
            OrderSide::Buy => tick.ask,
            OrderSide::Sell => tick.bid,
        };

        if !self.debouncer.lock().accept(now) {
            increment(CounterMetric::SignalsDebounced);
            tracing::debug!(symbol = %symbol.id, %side, "Signal debounced");
            return None;
        }

        let signal = TradeSignal {
            symbol: symbol.id,
            side,
            price,
        };
        increment(CounterMetric::SignalsEmitted);
        tracing::info!(
            symbol = %signal.symbol,
            side = %signal.side,
            price = %signal.price,
            fast = %ema.fast,
            slow = %ema.slow,
            prev_fast = %ema.prev_fast,
            prev_slow = %ema.prev_slow,
            "Crossover signal"
        );
        self.handler.on_signal(signal.clone());
        Some(signal)
    }

    /// Consume ticks until the channel closes or `token` is cancelled
    pub async fn run(&self, mut ticks: mpsc::Receiver<Tick>, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                tick = ticks.recv() => match tick {
                    Some(tick) => {
                        self.on_tick(&tick, Instant::now());
                    }
                    None => {
                        tracing::warn!("Tick stream ended");
                        break;
                    }
                },
            }
        }
        tracing::info!("Decision engine stopped");
    }
}
