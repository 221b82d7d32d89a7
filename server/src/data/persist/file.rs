//! JSON file store
//!
//! All keys live in a single JSON object. Every mutation rewrites the file
//! through a temp file and rename, so a crash never leaves a half-written
//! state file behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::KeyValueStore;
use super::error::PersistError;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, creating it on first write
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        let entries = Self::load(&path)?;
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn load(path: &Path) -> Result<BTreeMap<String, String>, PersistError> {
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<BTreeMap<String, String>>(&json) {
                Ok(entries) => {
                    tracing::debug!(count = entries.len(), path = %path.display(), "Loaded state file");
                    Ok(entries)
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Corrupted state file, creating backup and starting fresh"
                    );
                    let backup = format!(
                        "{}.corrupt.{}",
                        path.display(),
                        chrono::Utc::now().timestamp()
                    );
                    if let Err(rename_err) = std::fs::rename(path, &backup) {
                        tracing::warn!(error = %rename_err, "Failed to backup corrupted state file");
                    } else {
                        tracing::info!(backup = %backup, "Backed up corrupted state file");
                    }
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No existing state file, starting empty");
                Ok(BTreeMap::new())
            }
            Err(e) => Err(PersistError::io(path, e)),
        }
    }

    fn atomic_write(&self, entries: &BTreeMap<String, String>) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(entries)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| PersistError::io(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| PersistError::io(&self.path, e))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), PersistError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value);
        self.atomic_write(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.atomic_write(&entries)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<usize, PersistError> {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        self.atomic_write(&entries)?;
        Ok(count)
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).unwrap();
        store.set("orders.recent_queries", "[\"a\"]".to_string()).unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("orders.recent_queries").unwrap().as_deref(),
            Some("[\"a\"]")
        );
    }

    #[test]
    fn test_missing_file_starts_empty_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::open(&path).unwrap();
        assert!(store.get("anything").unwrap().is_none());

        store.set("k", "v".to_string()).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corruption_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not-json{{{").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.get("k").unwrap().is_none());

        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .contains("state.json.corrupt.")
            })
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn test_remove_and_clear_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).unwrap();
        store.set("a", "1".to_string()).unwrap();
        store.set("b", "2".to_string()).unwrap();
        store.remove("a").unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.get("a").unwrap().is_none());
        assert_eq!(reopened.clear().unwrap(), 1);

        let emptied = FileStore::open(&path).unwrap();
        assert!(emptied.get("b").unwrap().is_none());
    }
}
