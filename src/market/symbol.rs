//! Tradable symbols and their per-symbol state

use super::lease::TradeLease;
use super::MarketError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange pair codes, one per purpose.
///
/// Kraken names the same instrument differently per endpoint (`BTCUSD` for
/// AddOrder, `XBTUSD` for OHLC, `XXBT` in the balance map), so each purpose
/// carries its own code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCodes {
    /// Pair code used when placing orders
    pub order: String,
    /// Pair code used for historical candles
    pub data: String,
    /// Currency code in the balance response
    pub balance: String,
}

impl SymbolCodes {
    /// Check that every purpose code is present
    pub fn validate(&self, id: &str) -> Result<(), MarketError> {
        for (purpose, code) in [
            ("order", &self.order),
            ("data", &self.data),
            ("balance", &self.balance),
        ] {
            if code.trim().is_empty() {
                return Err(MarketError::MissingCode {
                    symbol: id.to_string(),
                    purpose,
                });
            }
        }
        // stream_pair splits on a byte offset
        if !self.order.is_ascii() || self.order.len() <= QUOTE_LEN {
            return Err(MarketError::InvalidOrderCode {
                symbol: id.to_string(),
                code: self.order.clone(),
            });
        }
        Ok(())
    }

    /// Display pair used by the ticker stream, e.g. `BTCUSD` -> `BTC/USD`
    pub fn stream_pair(&self) -> String {
        let split = self.order.len().saturating_sub(QUOTE_LEN);
        let (base, quote) = self.order.split_at(split);
        format!("{}/{}", base, quote)
    }
}

/// Length of the quote currency suffix on order codes
const QUOTE_LEN: usize = 3;

/// Fast/slow EMA values for the current and previous refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmaPair {
    pub fast: Decimal,
    pub slow: Decimal,
    pub prev_fast: Decimal,
    pub prev_slow: Decimal,
}

/// Indicator state as stored on a symbol; absent until computed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub fast_ema: Option<Decimal>,
    pub slow_ema: Option<Decimal>,
    pub prev_fast_ema: Option<Decimal>,
    pub prev_slow_ema: Option<Decimal>,
}

impl Indicator {
    /// Shift current values into the previous slots, then store the new ones
    pub fn apply(&mut self, fast: Decimal, slow: Decimal) {
        self.prev_fast_ema = self.fast_ema;
        self.prev_slow_ema = self.slow_ema;
        self.fast_ema = Some(fast);
        self.slow_ema = Some(slow);
    }

    /// All four values, or `None` while any of them is still missing
    pub fn ema_pair(&self) -> Option<EmaPair> {
        Some(EmaPair {
            fast: self.fast_ema?,
            slow: self.slow_ema?,
            prev_fast: self.prev_fast_ema?,
            prev_slow: self.prev_slow_ema?,
        })
    }
}

/// One tradable instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    /// Base asset ticker, e.g. "BTC"
    pub id: String,
    pub codes: SymbolCodes,
    /// Decimal places accepted for limit prices
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,
    /// Quantity currently owned
    #[serde(default)]
    pub holding: Decimal,
    #[serde(default)]
    pub indicator: Indicator,
    /// Last 24h change reported by the ticker (informational)
    #[serde(default)]
    pub last_24h_change_pct: Option<Decimal>,
    #[serde(skip)]
    pub lease: TradeLease,
}

fn default_price_decimals() -> u32 {
    2
}

impl Symbol {
    /// Create a flat symbol with no indicator data
    pub fn new(id: impl Into<String>, codes: SymbolCodes, price_decimals: u32) -> Self {
        Self {
            id: id.into(),
            codes,
            price_decimals,
            holding: Decimal::ZERO,
            indicator: Indicator::default(),
            last_24h_change_pct: None,
            lease: TradeLease::default(),
        }
    }

    /// A symbol is flat when its holding is below `epsilon`
    pub fn is_flat(&self, epsilon: Decimal) -> bool {
        self.holding < epsilon
    }

    /// Validate codes and that the stream pair resolves back to this id
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.id.trim().is_empty() {
            return Err(MarketError::EmptyId);
        }
        self.codes.validate(&self.id)?;
        let pair = self.codes.stream_pair();
        if base_of(&pair) != self.id {
            return Err(MarketError::PairMismatch {
                symbol: self.id.clone(),
                pair,
            });
        }
        Ok(())
    }
}

/// Strip the quote half off an exchange display pair (`BTC/USD` -> `BTC`)
pub fn base_of(pair: &str) -> &str {
    pair.split('/').next().unwrap_or(pair)
}
