//! Exchange error taxonomy and retry classification

use thiserror::Error;

/// Errors returned by exchange calls
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// Socket or HTTP failure
    #[error("transport error: {0}")]
    Transport(String),
    /// Bad key, signature or nonce
    #[error("auth error: {0}")]
    Auth(String),
    /// Exchange-side rejection (rate limit, unavailable, generic)
    #[error("exchange error: {0}")]
    Exchange(String),
    /// Insufficient balance for the order
    #[error("funding error: {0}")]
    Funding(String),
    /// Historical data missing or malformed
    #[error("data unavailable: {0}")]
    DataUnavailable(String),
    /// Response body could not be understood
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// How the retry loop treats an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Expected to clear on retry
    Retryable,
    /// Will not succeed on retry; surface immediately
    Terminal,
    /// Unknown; retry until attempts are exhausted
    Unclassified,
}

const RETRYABLE_MARKERS: &[&str] = &["invalid nonce", "rate limit exceeded"];
const TERMINAL_MARKERS: &[&str] = &["unavailable", "insufficient funds"];
const AUTH_MARKERS: &[&str] = &["invalid key", "invalid signature", "invalid nonce", "permission denied"];

impl ExchangeError {
    /// Build an error from Kraken's `error` list, e.g. `["EOrder:Insufficient funds"]`
    pub fn from_messages(messages: &[String]) -> Self {
        let joined = messages.join(", ");
        let lower = joined.to_lowercase();
        if lower.contains("insufficient funds") {
            ExchangeError::Funding(joined)
        } else if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
            ExchangeError::Auth(joined)
        } else {
            ExchangeError::Exchange(joined)
        }
    }

    /// The message carried by the error
    pub fn message(&self) -> &str {
        match self {
            ExchangeError::Transport(m)
            | ExchangeError::Auth(m)
            | ExchangeError::Exchange(m)
            | ExchangeError::Funding(m)
            | ExchangeError::DataUnavailable(m)
            | ExchangeError::Protocol(m) => m,
        }
    }

    /// Classify by message content
    pub fn class(&self) -> ErrorClass {
        if matches!(self, ExchangeError::Funding(_)) {
            return ErrorClass::Terminal;
        }
        let lower = self.message().to_lowercase();
        if RETRYABLE_MARKERS.iter().any(|m| lower.contains(m)) {
            ErrorClass::Retryable
        } else if TERMINAL_MARKERS.iter().any(|m| lower.contains(m)) {
            ErrorClass::Terminal
        } else {
            ErrorClass::Unclassified
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ExchangeError::Protocol(e.to_string())
        } else {
            ExchangeError::Transport(e.to_string())
        }
    }
}
