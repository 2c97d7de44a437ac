//! Balance module
//!
//! Reconciles exchange-reported balances into per-symbol holdings

use crate::exchange::{Balance, ExchangeApi, ExchangeError};
use crate::market::SymbolTable;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Owns the latest balance snapshot and pushes it into the symbol table
pub struct BalanceTracker {
    exchange: Arc<dyn ExchangeApi>,
    table: SymbolTable,
    snapshot: RwLock<Balance>,
}

impl BalanceTracker {
    pub fn new(exchange: Arc<dyn ExchangeApi>, table: SymbolTable) -> Self {
        Self {
            exchange,
            table,
            snapshot: RwLock::new(Balance::default()),
        }
    }

    /// Fetch balances, replace the snapshot, and overwrite holdings.
    ///
    /// Symbols whose balance code is missing from the response keep their
    /// holding. Returns the number of symbols updated.
    pub async fn refresh(&self) -> Result<usize, ExchangeError> {
        let balance = self.exchange.fetch_balance().await?;
        let updated = self.table.reconcile(&balance);
        tracing::info!(
            currencies = balance.len(),
            symbols_updated = updated,
            "Balances refreshed"
        );
        *self.snapshot.write() = balance;
        Ok(updated)
    }

    /// Available amount of `code` in the last snapshot (zero when absent)
    pub fn available(&self, code: &str) -> Decimal {
        self.snapshot.read().get(code).unwrap_or(Decimal::ZERO)
    }

    /// Copy of the last snapshot
    pub fn snapshot(&self) -> Balance {
        self.snapshot.read().clone()
    }
}
