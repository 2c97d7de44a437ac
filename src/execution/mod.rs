//! Execution module
//!
//! Turns trade signals into sized, signed limit orders with a per-symbol
//! lease so at most one order per symbol is in flight.

mod executor;
mod sizing;
mod types;

pub use executor::TradeExecutor;
pub use sizing::{buy_volume, limit_price, VOLUME_DECIMALS};
pub use types::{ExecutorConfig, TradeError, TradeReport};
