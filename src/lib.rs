//! ema-trader: EMA crossover trading bot for Kraken spot markets
//!
//! This library provides the core components for:
//! - Real-time ticker feed from the Kraken v2 WebSocket
//! - Signed REST access to balances, orders and historical candles
//! - Dual-EMA indicators refreshed on a timer
//! - Crossover detection with a process-wide debounce
//! - Leased, cooldown-guarded trade execution
//! - Telegram notifications and JSON state snapshots
//! - Full observability stack

pub mod balance;
pub mod bot;
pub mod cli;
pub mod config;
pub mod data;
pub mod exchange;
pub mod execution;
pub mod feed;
pub mod indicator;
pub mod market;
pub mod notify;
pub mod strategy;
pub mod telemetry;
pub mod ws;

#[cfg(test)]
mod testing;
