//! Shared symbol table

use super::{MarketError, Symbol};
use crate::exchange::Balance;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Cloneable handle to the symbol set.
///
/// The set is fixed at construction; symbols are mutated in place. The lock is
/// never held across an await point, so every method here is atomic with
/// respect to the other tasks touching the table.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    inner: Arc<RwLock<BTreeMap<String, Symbol>>>,
}

impl SymbolTable {
    /// Build a table, validating every symbol
    pub fn new(symbols: Vec<Symbol>) -> Result<Self, MarketError> {
        if symbols.is_empty() {
            return Err(MarketError::NoSymbols);
        }
        let mut map = BTreeMap::new();
        for symbol in symbols {
            symbol.validate()?;
            if map.contains_key(&symbol.id) {
                return Err(MarketError::DuplicateSymbol(symbol.id));
            }
            map.insert(symbol.id.clone(), symbol);
        }
        Ok(Self {
            inner: Arc::new(RwLock::new(map)),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Symbol> {
        self.inner.read().get(id).cloned()
    }

    /// Copy of every symbol, ordered by id
    pub fn snapshot(&self) -> Vec<Symbol> {
        self.inner.read().values().cloned().collect()
    }

    /// Stream display pairs for every symbol
    pub fn stream_pairs(&self) -> Vec<String> {
        self.inner
            .read()
            .values()
            .map(|s| s.codes.stream_pair())
            .collect()
    }

    /// `(id, data code)` for every symbol
    pub fn data_codes(&self) -> Vec<(String, String)> {
        self.inner
            .read()
            .values()
            .map(|s| (s.id.clone(), s.codes.data.clone()))
            .collect()
    }

    /// Store a freshly computed fast/slow pair, shifting the previous one
    pub fn apply_indicator(&self, id: &str, fast: Decimal, slow: Decimal) -> bool {
        match self.inner.write().get_mut(id) {
            Some(symbol) => {
                symbol.indicator.apply(fast, slow);
                true
            }
            None => false,
        }
    }

    pub fn record_change_pct(&self, id: &str, change_pct: Decimal) {
        if let Some(symbol) = self.inner.write().get_mut(id) {
            symbol.last_24h_change_pct = Some(change_pct);
        }
    }

    /// Overwrite holdings from a balance snapshot.
    ///
    /// Symbols whose balance code is absent keep their current holding.
    /// Returns the number of symbols updated.
    pub fn reconcile(&self, balance: &Balance) -> usize {
        let mut updated = 0;
        for symbol in self.inner.write().values_mut() {
            if let Some(amount) = balance.get(&symbol.codes.balance) {
                symbol.holding = amount;
                updated += 1;
            }
        }
        updated
    }

    /// Number of symbols currently flat
    pub fn flat_count(&self, epsilon: Decimal) -> usize {
        self.inner
            .read()
            .values()
            .filter(|s| s.is_flat(epsilon))
            .count()
    }

    /// Check-and-set the trade lease for `id`.
    ///
    /// Returns `Ok(false)` when the lease is already held.
    pub fn try_acquire_lease(&self, id: &str, now: Instant) -> Result<bool, MarketError> {
        let mut map = self.inner.write();
        let symbol = map
            .get_mut(id)
            .ok_or_else(|| MarketError::UnknownSymbol(id.to_string()))?;
        Ok(symbol.lease.try_acquire(now))
    }

    /// Start the cooldown on `id`'s lease
    pub fn release_lease(&self, id: &str, now: Instant, cooldown: Duration) {
        if let Some(symbol) = self.inner.write().get_mut(id) {
            symbol.lease.release(now, cooldown);
        }
    }

    /// Carry persisted holdings and indicators over to the configured symbols.
    ///
    /// Persisted entries for ids no longer configured are ignored. Returns the
    /// number of symbols restored.
    pub fn restore(&self, persisted: &[Symbol]) -> usize {
        let mut map = self.inner.write();
        let mut restored = 0;
        for saved in persisted {
            if let Some(symbol) = map.get_mut(&saved.id) {
                symbol.holding = saved.holding;
                symbol.indicator = saved.indicator.clone();
                symbol.last_24h_change_pct = saved.last_24h_change_pct;
                restored += 1;
            }
        }
        restored
    }
}
