//! Request signing and nonce generation for private endpoints

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use std::sync::atomic::{AtomicU64, Ordering};

use super::ExchangeError;

type HmacSha512 = Hmac<Sha512>;

/// Process-wide nonce source.
///
/// Seeded once from the start-up clock (microseconds) so nonces stay above
/// those of earlier runs, then incremented per call without consulting the
/// clock again.
#[derive(Debug)]
pub struct NonceCounter {
    last: AtomicU64,
}

impl NonceCounter {
    /// Create a counter whose first nonce is `seed + 1`
    pub fn new(seed: u64) -> Self {
        Self {
            last: AtomicU64::new(seed),
        }
    }

    /// Create a counter seeded from the current time in microseconds
    pub fn from_clock() -> Self {
        let micros = chrono::Utc::now().timestamp_micros().max(0) as u64;
        Self::new(micros)
    }

    /// Next nonce; strictly greater than every nonce handed out before
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Default for NonceCounter {
    fn default() -> Self {
        Self::from_clock()
    }
}

/// HMAC-SHA512 signer for Kraken private requests
#[derive(Clone)]
pub struct Signer {
    secret: Vec<u8>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

impl Signer {
    /// Decode the base64 API secret
    pub fn new(secret_b64: &str) -> Result<Self, ExchangeError> {
        let secret = STANDARD
            .decode(secret_b64.trim())
            .map_err(|e| ExchangeError::Auth(format!("API secret is not valid base64: {}", e)))?;
        Ok(Self { secret })
    }

    /// `base64(HMAC-SHA512(secret, path ++ SHA256(nonce ++ body)))`
    pub fn sign(&self, path: &str, nonce: u64, body: &str) -> Result<String, ExchangeError> {
        let mut sha = Sha256::new();
        sha.update(nonce.to_string().as_bytes());
        sha.update(body.as_bytes());
        let digest = sha.finalize();

        let mut mac = HmacSha512::new_from_slice(&self.secret)
            .map_err(|e| ExchangeError::Auth(format!("invalid HMAC key: {}", e)))?;
        mac.update(path.as_bytes());
        mac.update(&digest);
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}
