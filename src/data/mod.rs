//! Persistence module
//!
//! Snapshots of symbol and subscriber state, stored as JSON files

mod json;
mod types;

pub use json::{JsonStateStore, MARKET_DATA_FILE, SUBSCRIBERS_FILE};
pub use types::{PersistedState, StoreError, Subscriber, SubscriberState};

use async_trait::async_trait;

/// Trait for state storage backends
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the last saved state; missing state loads as empty
    async fn load(&self) -> Result<PersistedState, StoreError>;
    /// Replace the saved state
    async fn save(&self, state: &PersistedState) -> Result<(), StoreError>;
}
