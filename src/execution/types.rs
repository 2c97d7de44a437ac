//! Execution types

use crate::exchange::{ExchangeError, Order, OrderResult, UnknownSide};
use crate::market::MarketError;
use rust_decimal::Decimal;
use std::time::Duration;

/// Trade executor settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Limit price buffer
    pub slippage: Decimal,
    /// Lease cooldown after each attempt
    pub cooldown: Duration,
    /// Balance code of the quote currency
    pub quote_code: String,
    /// Holdings below this count as flat
    pub flat_epsilon: Decimal,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            slippage: Decimal::new(5, 4),
            cooldown: Duration::from_secs(10),
            quote_code: "ZUSD".to_string(),
            flat_epsilon: Decimal::new(1, 6),
        }
    }
}

/// A completed order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeReport {
    pub order: Order,
    pub result: OrderResult,
}

/// Trade execution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    #[error("trade already in progress or cooling down for {0}")]
    LeaseHeld(String),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    InvalidSide(#[from] UnknownSide),

    #[error("no {0} holding to sell")]
    NothingToSell(String),

    #[error("cannot size {symbol} order at price {price}")]
    PriceOutOfRange { symbol: String, price: Decimal },

    #[error("insufficient {code} balance to buy {symbol}")]
    InsufficientFunds { symbol: String, code: String },

    #[error("order failed: {0}")]
    Exchange(#[from] ExchangeError),
}
