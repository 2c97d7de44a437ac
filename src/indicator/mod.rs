//! Indicator module
//!
//! EMA computation and the per-symbol indicator store

mod ema;
mod store;

pub use ema::{calculate_ema, EMA_DECIMALS};
pub use store::{EmaValues, IndicatorError, IndicatorSettings, IndicatorStore, RefreshReport};
