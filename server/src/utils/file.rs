//! Path helpers

use std::path::{Path, PathBuf};

/// Expand a user-supplied path to an absolute one
///
/// `~` and `~/...` resolve against the home directory; relative paths
/// (including bare names like `orders.json`) resolve against the current
/// directory without canonicalizing, so the path need not exist yet.
/// Blank input yields the current directory.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();
    let cwd = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if path.is_empty() {
        return cwd();
    }

    let expanded = match path.strip_prefix('~') {
        Some("") => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        Some(rest) if rest.starts_with('/') || rest.starts_with('\\') => dirs::home_dir()
            .map(|home| home.join(&rest[1..]))
            .unwrap_or_else(|| PathBuf::from(path)),
        _ => PathBuf::from(path),
    };

    absolutize(&cwd(), expanded)
}

fn absolutize(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path
    }
}
