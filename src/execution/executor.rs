//! Trade executor: per-symbol lease, sizing, submission, reporting

use super::sizing::{buy_volume, limit_price};
use super::{ExecutorConfig, TradeError, TradeReport};
use crate::balance::BalanceTracker;
use crate::exchange::{ExchangeApi, Order, OrderSide};
use crate::market::{MarketError, SymbolTable};
use crate::notify::Notifier;
use crate::strategy::{SignalHandler, TradeSignal};
use crate::telemetry::{increment, record_latency, CounterMetric, LatencyMetric};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

struct Inner {
    exchange: Arc<dyn ExchangeApi>,
    balances: Arc<BalanceTracker>,
    table: SymbolTable,
    notifier: Arc<dyn Notifier>,
    config: ExecutorConfig,
    reports: Option<mpsc::Sender<TradeReport>>,
    /// Background trades started by `dispatch`
    tasks: TaskTracker,
}

/// Places orders for trade signals, at most one in flight per symbol
#[derive(Clone)]
pub struct TradeExecutor {
    inner: Arc<Inner>,
}

impl TradeExecutor {
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        balances: Arc<BalanceTracker>,
        table: SymbolTable,
        notifier: Arc<dyn Notifier>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                exchange,
                balances,
                table,
                notifier,
                config,
                reports: None,
                tasks: TaskTracker::new(),
            }),
        }
    }

    /// Also send every completed trade to `reports`
    pub fn with_reports(
        exchange: Arc<dyn ExchangeApi>,
        balances: Arc<BalanceTracker>,
        table: SymbolTable,
        notifier: Arc<dyn Notifier>,
        config: ExecutorConfig,
        reports: mpsc::Sender<TradeReport>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                exchange,
                balances,
                table,
                notifier,
                config,
                reports: Some(reports),
                tasks: TaskTracker::new(),
            }),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.inner.config
    }

    /// Take the lease for `signal.symbol` and run the trade in the background.
    ///
    /// The lease is taken before this returns, so a second signal for the
    /// same symbol is skipped even if the first has not started yet. Returns
    /// whether a trade was started; nothing starts once [`Self::drain`] ran.
    pub fn dispatch(&self, signal: TradeSignal) -> bool {
        if self.inner.tasks.is_closed() {
            tracing::info!(symbol = %signal.symbol, side = %signal.side, "Skipping trade, executor draining");
            return false;
        }
        match self.acquire(&signal.symbol) {
            Ok(()) => {
                let executor = self.clone();
                self.inner.tasks.spawn(async move {
                    // Errors are reported inside
                    let _ = executor
                        .run_leased(&signal.symbol, signal.side, signal.price)
                        .await;
                });
                true
            }
            Err(e) => {
                tracing::info!(symbol = %signal.symbol, side = %signal.side, reason = %e, "Skipping trade");
                false
            }
        }
    }

    /// Stop accepting signals and wait for dispatched trades to finish
    pub async fn drain(&self) {
        self.inner.tasks.close();
        if !self.inner.tasks.is_empty() {
            tracing::info!(in_flight = self.inner.tasks.len(), "Waiting for in-flight trades");
        }
        self.inner.tasks.wait().await;
    }

    /// Run one trade to completion
    pub async fn execute(
        &self,
        symbol: &str,
        side: OrderSide,
        price: Decimal,
    ) -> Result<TradeReport, TradeError> {
        self.acquire(symbol)?;
        self.run_leased(symbol, side, price).await
    }

    /// Run a trade whose side comes from outside the program.
    ///
    /// An unrecognised side notifies the operator and submits nothing.
    pub async fn execute_manual(
        &self,
        symbol: &str,
        side: &str,
        price: Decimal,
    ) -> Result<TradeReport, TradeError> {
        let side: OrderSide = match side.parse() {
            Ok(side) => side,
            Err(e) => {
                tracing::error!(symbol, error = %e, "Refusing trade with unknown side");
                self.inner
                    .notifier
                    .notify_operator(&format!(
                        "Trade for {} not submitted: {}",
                        symbol, e
                    ))
                    .await;
                return Err(TradeError::InvalidSide(e));
            }
        };
        self.execute(symbol, side, price).await
    }

    fn acquire(&self, symbol: &str) -> Result<(), TradeError> {
        if self.inner.table.try_acquire_lease(symbol, Instant::now())? {
            Ok(())
        } else {
            increment(CounterMetric::TradesSkipped);
            Err(TradeError::LeaseHeld(symbol.to_string()))
        }
    }

    /// Trade body; the caller holds the lease, which is released on return
    async fn run_leased(
        &self,
        symbol: &str,
        side: OrderSide,
        price: Decimal,
    ) -> Result<TradeReport, TradeError> {
        let started = Instant::now();
        let result = self.submit(symbol, side, price).await;
        record_latency(LatencyMetric::OrderSubmission, started.elapsed());

        match &result {
            Ok(report) => {
                increment(CounterMetric::OrdersSubmitted);
                tracing::info!(
                    symbol,
                    %side,
                    price = %report.order.price,
                    volume = %report.order.volume,
                    txids = ?report.result.txids,
                    "Order placed"
                );
                if let Err(e) = self.inner.balances.refresh().await {
                    tracing::warn!(symbol, error = %e, "Balance refresh after trade failed");
                }
                self.inner.notifier.notify(&fill_message(report)).await;
                if let Some(reports) = &self.inner.reports {
                    let _ = reports.send(report.clone()).await;
                }
            }
            Err(e) => {
                increment(CounterMetric::OrdersFailed);
                tracing::error!(symbol, %side, %price, error = %e, "Trade failed");
                self.inner
                    .notifier
                    .notify_operator(&format!("{} {} at {} failed: {}", side, symbol, price, e))
                    .await;
            }
        }

        self.inner
            .table
            .release_lease(symbol, Instant::now(), self.inner.config.cooldown);
        result
    }

    /// Size and place the order
    async fn submit(
        &self,
        symbol: &str,
        side: OrderSide,
        price: Decimal,
    ) -> Result<TradeReport, TradeError> {
        let config = &self.inner.config;
        let out_of_range = || TradeError::PriceOutOfRange {
            symbol: symbol.to_string(),
            price,
        };
        let entry = self
            .inner
            .table
            .get(symbol)
            .ok_or_else(|| MarketError::UnknownSymbol(symbol.to_string()))?;

        let volume = match side {
            OrderSide::Buy => {
                let quote = self.inner.balances.available(&config.quote_code);
                let flat = self.inner.table.flat_count(config.flat_epsilon);
                let volume = buy_volume(quote, flat, price).ok_or_else(out_of_range)?;
                tracing::debug!(symbol, %quote, flat, %volume, "Sized buy");
                if volume <= Decimal::ZERO {
                    return Err(TradeError::InsufficientFunds {
                        symbol: symbol.to_string(),
                        code: config.quote_code.clone(),
                    });
                }
                volume
            }
            OrderSide::Sell => {
                if entry.holding <= Decimal::ZERO {
                    return Err(TradeError::NothingToSell(symbol.to_string()));
                }
                entry.holding
            }
        };

        let limit = limit_price(side, price, config.slippage, entry.price_decimals)
            .ok_or_else(out_of_range)?;
        let order = Order {
            symbol_id: entry.id.clone(),
            pair: entry.codes.order.clone(),
            side,
            price: limit,
            volume,
            client_order_id: Uuid::new_v4(),
        };

        let result = self.inner.exchange.place_order(&order).await?;
        Ok(TradeReport { order, result })
    }
}

impl SignalHandler for TradeExecutor {
    fn on_signal(&self, signal: TradeSignal) {
        self.dispatch(signal);
    }
}

fn fill_message(report: &TradeReport) -> String {
    let verb = match report.order.side {
        OrderSide::Buy => "Bought",
        OrderSide::Sell => "Sold",
    };
    format!(
        "{} {} {} at {} ({})",
        verb,
        report.order.volume,
        report.order.symbol_id,
        report.order.price,
        report.result.txids.join(", ")
    )
}
