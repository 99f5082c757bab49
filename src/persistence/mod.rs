//! Persistence layer for Shellac.
//!
//! History is stored in a small key-value store. Two implementations are
//! provided: [`MemoryStore`] for tests and ephemeral sessions, and
//! [`SqliteStore`] for history that survives restarts.

mod migrations;
mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::{HistoryConfig, StorageBackend};
use crate::error::{Result, ShellacError};
use crate::history::PersistedHistory;

/// String key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.items.write().await.remove(key);
        Ok(())
    }
}

/// Opens the store selected by the history configuration.
pub async fn open_store(config: &HistoryConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.storage {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Sqlite => {
            let path = match &config.path {
                Some(path) => path.clone(),
                None => SqliteStore::default_path()?,
            };
            info!("Opening history store at {}", path.display());
            Ok(Arc::new(SqliteStore::open(&path).await?))
        }
    }
}

/// Reads persisted history entries.
///
/// A missing key is an empty history. A value that is not a JSON array of
/// strings is ignored with a warning.
pub async fn load_history(store: &dyn KeyValueStore, key: &str) -> Result<Vec<String>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(Vec::new());
    };

    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            warn!(key = %key, error = %e, "Ignoring malformed persisted history");
            Ok(Vec::new())
        }
    }
}

/// Writes history entries as a JSON array.
pub async fn save_history(store: &dyn KeyValueStore, history: &PersistedHistory) -> Result<()> {
    let value = serde_json::to_string(&history.entries)
        .map_err(|e| ShellacError::persistence(format!("Failed to encode history: {e}")))?;
    store.set(&history.key, &value).await
}
