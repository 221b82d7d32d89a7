//! Key-value persistence for per-table UI state
//!
//! Values are JSON strings keyed by `<table>.<kind>`. Two backends exist:
//! - `file` - a single JSON file in the data directory
//! - `memory` - process-local, lost on exit (`--ephemeral`)
//!
//! Failures never take a table down. Readers fall back to defaults and
//! writers log, so the in-memory state stays authoritative for the session.

mod error;
mod file;
mod memory;

pub use error::PersistError;
pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::storage::AppStorage;

/// Synchronous key-value store
///
/// Implementations must be cheap enough to call while a table's state lock
/// is held; they never await.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError>;

    fn set(&self, key: &str, value: String) -> Result<(), PersistError>;

    /// Remove a key. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<(), PersistError>;

    /// Remove everything, returning how many keys were dropped
    fn clear(&self) -> Result<usize, PersistError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Open the store selected by the storage settings
pub fn open_store(storage: &AppStorage) -> Result<Arc<dyn KeyValueStore>, PersistError> {
    let store: Arc<dyn KeyValueStore> = match storage.state_file() {
        Some(path) => Arc::new(FileStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };
    tracing::debug!(backend = store.backend_name(), "Opened state store");
    Ok(store)
}

/// Storage key for one kind of state of one table
pub fn state_key(table: &str, kind: &str) -> String {
    format!("{}.{}", table, kind)
}

/// Read and decode a value, falling back to the default on any failure
pub fn load_or_default<T>(store: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            tracing::warn!(error = %e, key, "Failed to read persisted state");
            return T::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, key, "Discarding malformed persisted state");
            T::default()
        }
    }
}

/// Encode and write a value, logging failures
pub fn store_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
    let result = serde_json::to_string(value)
        .map_err(PersistError::from)
        .and_then(|json| store.set(key, json));
    if let Err(e) = result {
        tracing::warn!(error = %e, key, "Failed to persist state");
    }
}
