//! Per-symbol dual-EMA state, refreshed wholesale from historical closes

use super::calculate_ema;
use crate::exchange::{ExchangeApi, ExchangeError};
use crate::market::SymbolTable;
use crate::telemetry::{increment, record_latency, CounterMetric, LatencyMetric};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Indicator refresh errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndicatorError {
    #[error("historical data unavailable for {symbol}: {source}")]
    DataUnavailable {
        symbol: String,
        source: ExchangeError,
    },

    #[error("insufficient data for {symbol}: got {got} closes, need {need}")]
    InsufficientData {
        symbol: String,
        got: usize,
        need: usize,
    },

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
}

/// EMA periods and candle settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorSettings {
    pub fast_period: usize,
    pub slow_period: usize,
    /// Candle interval in minutes
    pub interval_minutes: u32,
    /// Use only the most recent N closes
    pub history_window: Option<usize>,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 20,
            interval_minutes: 15,
            history_window: None,
        }
    }
}

/// Fresh fast/slow values for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmaValues {
    pub fast: Decimal,
    pub slow: Decimal,
}

/// Outcome of one refresh cycle
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub updated: Vec<(String, EmaValues)>,
    pub failed: Vec<IndicatorError>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Keeps every symbol's indicator current
pub struct IndicatorStore {
    exchange: Arc<dyn ExchangeApi>,
    table: SymbolTable,
    settings: IndicatorSettings,
}

impl IndicatorStore {
    pub fn new(exchange: Arc<dyn ExchangeApi>, table: SymbolTable, settings: IndicatorSettings) -> Self {
        Self {
            exchange,
            table,
            settings,
        }
    }

    pub fn settings(&self) -> &IndicatorSettings {
        &self.settings
    }

    /// Compute fast and slow EMAs over `closes` (oldest first)
    pub fn compute(&self, symbol: &str, closes: &[Decimal]) -> Result<EmaValues, IndicatorError> {
        let window = match self.settings.history_window {
            Some(n) if closes.len() > n => &closes[closes.len() - n..],
            _ => closes,
        };

        let need = self.settings.slow_period.max(self.settings.fast_period);
        let insufficient = || IndicatorError::InsufficientData {
            symbol: symbol.to_string(),
            got: window.len(),
            need,
        };

        let fast = calculate_ema(window, self.settings.fast_period).ok_or_else(insufficient)?;
        let slow = calculate_ema(window, self.settings.slow_period).ok_or_else(insufficient)?;
        Ok(EmaValues { fast, slow })
    }

    /// Fetch closes for one symbol and store the new EMA pair.
    ///
    /// On any failure the symbol's previous values are left as they were.
    pub async fn refresh_symbol(&self, id: &str) -> Result<EmaValues, IndicatorError> {
        let symbol = self
            .table
            .get(id)
            .ok_or_else(|| IndicatorError::UnknownSymbol(id.to_string()))?;

        let closes = self
            .exchange
            .fetch_historical_closes(&symbol.codes.data, self.settings.interval_minutes)
            .await
            .map_err(|source| IndicatorError::DataUnavailable {
                symbol: id.to_string(),
                source,
            })?;

        let values = self.compute(id, &closes)?;
        if !self.table.apply_indicator(id, values.fast, values.slow) {
            return Err(IndicatorError::UnknownSymbol(id.to_string()));
        }

        tracing::debug!(
            symbol = %id,
            closes = closes.len(),
            fast = %values.fast,
            slow = %values.slow,
            "Indicator refreshed"
        );
        Ok(values)
    }

    /// Refresh every symbol concurrently; one failure never blocks the others
    pub async fn refresh_all(&self) -> RefreshReport {
        let started = Instant::now();
        let ids = self.table.ids();
        let results = join_all(ids.iter().map(|id| self.refresh_symbol(id))).await;

        let mut report = RefreshReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(values) => report.updated.push((id, values)),
                Err(e) => {
                    increment(CounterMetric::IndicatorRefreshFailures);
                    tracing::warn!(symbol = %id, error = %e, "Indicator refresh failed");
                    report.failed.push(e);
                }
            }
        }

        record_latency(LatencyMetric::IndicatorRefresh, started.elapsed());
        tracing::info!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            "Indicator refresh cycle complete"
        );
        report
    }

    /// Refresh immediately, then every `every` until `token` is cancelled.
    ///
    /// `after_cycle` runs after each cycle.
    pub async fn run<F, Fut>(&self, every: Duration, token: CancellationToken, mut after_cycle: F)
    where
        F: FnMut(RefreshReport) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Indicator refresh stopped");
                    return;
                }
                _ = interval.tick() => {
                    let report = self.refresh_all().await;
                    after_cycle(report).await;
                }
            }
        }
    }
}
