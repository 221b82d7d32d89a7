//! In-memory store, used for `--ephemeral` runs and tests

use std::collections::HashMap;

use parking_lot::RwLock;

use super::KeyValueStore;
use super::error::PersistError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), PersistError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<usize, PersistError> {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
