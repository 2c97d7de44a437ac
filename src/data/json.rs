//! JSON file state store

use super::{PersistedState, StateStore, StoreError, SubscriberState};
use crate::market::Symbol;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Symbol snapshot file, keyed by symbol id
pub const MARKET_DATA_FILE: &str = "marketData.json";
/// Subscriber list file
pub const SUBSCRIBERS_FILE: &str = "subscribers.json";

/// Stores state as two pretty-printed JSON files in one directory
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    dir: PathBuf,
}

impl JsonStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, StoreError> {
        let path = self.dir.join(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No saved state, starting empty");
                return Ok(T::default());
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Json { path, source })
    }

    /// Write via a temporary file and rename, so readers never see a partial file
    async fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{}.tmp", name));
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self) -> Result<PersistedState, StoreError> {
        let symbols: BTreeMap<String, Symbol> = self.read(MARKET_DATA_FILE).await?;
        let subscribers: SubscriberState = self.read(SUBSCRIBERS_FILE).await?;
        Ok(PersistedState {
            symbols: symbols.into_values().collect(),
            subscribers,
        })
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let symbols: BTreeMap<&str, &Symbol> =
            state.symbols.iter().map(|s| (s.id.as_str(), s)).collect();
        self.write(MARKET_DATA_FILE, &symbols).await?;
        self.write(SUBSCRIBERS_FILE, &state.subscribers).await?;
        tracing::debug!(dir = %self.dir.display(), symbols = symbols.len(), "State saved");
        Ok(())
    }
}
