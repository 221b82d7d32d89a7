//! Platform-aware data storage directory management
//!
//! ## Platform Paths
//!
//! | Type | Windows | macOS | Linux |
//! |------|---------|-------|-------|
//! | Data | `%APPDATA%\Ivy\` | `~/Library/Application Support/Ivy/` | `$XDG_DATA_HOME/ivy/` |
//!
//! Table state (recent queries, saved filters, column layout) lives in a
//! single `state.json` inside the data directory. Ephemeral runs never touch
//! the disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

use super::config::AppConfig;
use super::constants::{APP_DOT_FOLDER, APP_NAME, ENV_DATA_DIR, STATE_FILE_NAME};
use crate::utils::file::expand_path;

/// Application storage manager
#[derive(Debug, Clone)]
pub struct AppStorage {
    data_dir: PathBuf,
    ephemeral: bool,
}

impl AppStorage {
    /// Initialize storage with platform-appropriate data directory
    pub async fn init(config: &AppConfig) -> Result<Self> {
        let data_dir = Self::resolve_data_dir();

        if config.ephemeral {
            tracing::warn!("Ephemeral mode: table state is kept in memory and lost on exit");
            return Ok(Self {
                data_dir,
                ephemeral: true,
            });
        }

        // Create directory first (canonicalize requires path to exist)
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        // Now canonicalize to get clean path for logging
        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);

        tracing::debug!(data_dir = %data_dir.display(), "Storage initialized");

        Ok(Self {
            data_dir,
            ephemeral: false,
        })
    }

    /// Resolve data directory from env var or platform default
    pub fn resolve_data_dir() -> PathBuf {
        // Check env var override first
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            return expand_path(&dir);
        }

        // Use platform-specific directory
        if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
            return proj_dirs.data_dir().to_path_buf();
        }

        // Fallback to local .ivy
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        cwd.join(APP_DOT_FOLDER)
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Path of the table state file, `None` when running ephemeral
    pub fn state_file(&self) -> Option<PathBuf> {
        (!self.ephemeral).then(|| self.data_dir.join(STATE_FILE_NAME))
    }

    /// Create AppStorage for testing with a specific data directory
    #[cfg(test)]
    pub fn init_for_test(data_dir: PathBuf, ephemeral: bool) -> Self {
        Self {
            data_dir,
            ephemeral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_file_location() {
        let storage = AppStorage::init_for_test(PathBuf::from("/var/lib/ivy"), false);
        assert_eq!(
            storage.state_file(),
            Some(PathBuf::from("/var/lib/ivy/state.json"))
        );
        assert!(!storage.is_ephemeral());
    }

    #[test]
    fn test_ephemeral_has_no_state_file() {
        let storage = AppStorage::init_for_test(PathBuf::from("/var/lib/ivy"), true);
        assert!(storage.state_file().is_none());
        assert!(storage.is_ephemeral());
    }

    #[test]
    fn test_resolve_data_dir_fallback() {
        // Without env var set, should return a non-empty path
        // SAFETY: Test runs single-threaded, no concurrent access to env var
        unsafe { std::env::remove_var(ENV_DATA_DIR) };
        let path = AppStorage::resolve_data_dir();
        assert!(!path.as_os_str().is_empty());
    }

    #[test]
    fn test_open_store_follows_ephemeral_flag() {
        use crate::data::persist::open_store;

        let dir = tempfile::tempdir().unwrap();
        let persistent = AppStorage::init_for_test(dir.path().to_path_buf(), false);
        assert_eq!(open_store(&persistent).unwrap().backend_name(), "file");

        let ephemeral = AppStorage::init_for_test(dir.path().to_path_buf(), true);
        assert_eq!(open_store(&ephemeral).unwrap().backend_name(), "memory");
    }
}
