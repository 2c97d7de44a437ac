//! Prometheus metrics

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMetric {
    /// Normalised ticks received from the stream
    TicksReceived,
    /// Stream messages dropped as malformed
    MalformedMessages,
    /// Crossover signals accepted
    SignalsEmitted,
    /// Crossover signals dropped by the debounce window
    SignalsDebounced,
    /// Signals skipped because the symbol lease was held
    TradesSkipped,
    /// Orders accepted by the exchange
    OrdersSubmitted,
    /// Orders that failed after retries
    OrdersFailed,
    /// Stream reconnect attempts
    StreamReconnects,
    /// Per-symbol indicator refresh failures
    IndicatorRefreshFailures,
}

impl CounterMetric {
    pub fn name(self) -> &'static str {
        match self {
            CounterMetric::TicksReceived => "ema_trader_ticks_total",
            CounterMetric::MalformedMessages => "ema_trader_malformed_messages_total",
            CounterMetric::SignalsEmitted => "ema_trader_signals_total",
            CounterMetric::SignalsDebounced => "ema_trader_signals_debounced_total",
            CounterMetric::TradesSkipped => "ema_trader_trades_skipped_total",
            CounterMetric::OrdersSubmitted => "ema_trader_orders_submitted_total",
            CounterMetric::OrdersFailed => "ema_trader_orders_failed_total",
            CounterMetric::StreamReconnects => "ema_trader_stream_reconnects_total",
            CounterMetric::IndicatorRefreshFailures => "ema_trader_indicator_failures_total",
        }
    }
}

/// Latency metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyMetric {
    /// Order submission round trip, retries included
    OrderSubmission,
    /// One full indicator refresh cycle
    IndicatorRefresh,
}

impl LatencyMetric {
    pub fn name(self) -> &'static str {
        match self {
            LatencyMetric::OrderSubmission => "ema_trader_order_submission_latency_ms",
            LatencyMetric::IndicatorRefresh => "ema_trader_indicator_refresh_latency_ms",
        }
    }
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    counter!(metric.name()).increment(1);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    histogram!(metric.name()).record(duration.as_secs_f64() * 1000.0);
}

/// Install the Prometheus exporter on `0.0.0.0:port`
pub fn install_prometheus(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}
