//! Exchange request and response types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side string that is neither `buy` nor `sell`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized order side: {0}")]
pub struct UnknownSide(pub String);

impl FromStr for OrderSide {
    type Err = UnknownSide;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            _ => Err(UnknownSide(s.to_string())),
        }
    }
}

/// A limit order about to be submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Symbol the order belongs to
    pub symbol_id: String,
    /// Order-placement pair code
    pub pair: String,
    pub side: OrderSide,
    /// Limit price
    pub price: Decimal,
    pub volume: Decimal,
    /// Idempotency token, reused across retries of the same order
    pub client_order_id: Uuid,
}

/// Exchange acknowledgement of a placed order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderResult {
    /// Exchange transaction ids
    pub txids: Vec<String>,
    /// Human-readable order description
    pub description: Option<String>,
}

/// Available amount per exchange currency code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance(HashMap<String, Decimal>);

impl Balance {
    pub fn get(&self, code: &str) -> Option<Decimal> {
        self.0.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Decimal)> {
        self.0.iter()
    }
}

impl From<HashMap<String, Decimal>> for Balance {
    fn from(map: HashMap<String, Decimal>) -> Self {
        Self(map)
    }
}

/// Kraken response envelope: `{error: [...], result: {...}}`
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    #[serde(default)]
    pub error: Vec<String>,
    pub result: Option<T>,
}

/// `result` of an AddOrder call
#[derive(Debug, Deserialize)]
pub(crate) struct AddOrderResult {
    #[serde(default)]
    pub txid: Vec<String>,
    pub descr: Option<OrderDescription>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderDescription {
    pub order: Option<String>,
}

impl From<AddOrderResult> for OrderResult {
    fn from(r: AddOrderResult) -> Self {
        Self {
            txids: r.txid,
            description: r.descr.and_then(|d| d.order),
        }
    }
}
