//! Exchange module
//!
//! Authenticated access to Kraken's private REST endpoints, unauthenticated
//! historical data, request signing, and the retry policy applied to private
//! calls.

mod client;
mod error;
mod retry;
mod signer;
mod types;

pub use client::{KrakenClient, RestConfig, KRAKEN_REST_URL};
pub use error::{ErrorClass, ExchangeError};
pub use retry::{RetryPolicy, Retrying};
pub use signer::{NonceCounter, Signer};
pub use types::{Balance, Order, OrderResult, OrderSide, UnknownSide};

use async_trait::async_trait;
use rust_decimal::Decimal;

/// Trait for exchange client implementations
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Closing prices for the lookback window, oldest first
    async fn fetch_historical_closes(
        &self,
        pair: &str,
        interval_minutes: u32,
    ) -> Result<Vec<Decimal>, ExchangeError>;

    /// Available amount per currency code
    async fn fetch_balance(&self) -> Result<Balance, ExchangeError>;

    /// Submit a limit order
    async fn place_order(&self, order: &Order) -> Result<OrderResult, ExchangeError>;
}
