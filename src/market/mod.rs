//! Market module
//!
//! The fixed set of tradable symbols, their exchange codes, indicator state,
//! holdings and trade leases.

mod lease;
mod symbol;
mod table;

pub use lease::TradeLease;
pub use symbol::{base_of, EmaPair, Indicator, Symbol, SymbolCodes};
pub use table::SymbolTable;

use thiserror::Error;

/// Symbol set errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("no symbols configured")]
    NoSymbols,
    #[error("symbol id is empty")]
    EmptyId,
    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
    #[error("symbol {symbol} is missing its {purpose} code")]
    MissingCode {
        symbol: String,
        purpose: &'static str,
    },
    #[error("symbol {symbol}: order code {code} is not an ASCII base+quote pair")]
    InvalidOrderCode { symbol: String, code: String },
    #[error("symbol {symbol}: stream pair {pair} does not resolve to the symbol id")]
    PairMismatch { symbol: String, pair: String },
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
}
