//! Per-repository scroll-position cache.
//!
//! The only state that survives a run: a tiny TOML map from repository
//! path to the change-id the cursor was on, so reopening a repository
//! lands back on the same revision. Load and save are best-effort — a
//! missing or corrupt cache file means starting at the top, never an
//! error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    positions: BTreeMap<String, String>,
}

/// Cursor positions remembered per repository.
#[derive(Debug)]
pub struct ScrollCache {
    path: PathBuf,
    positions: BTreeMap<String, String>,
}

impl ScrollCache {
    /// Load the cache from the default location
    /// (`~/.cache/jjlv/positions.toml`).
    pub fn load_default() -> Self {
        let path = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("jjlv")
            .join("positions.toml");
        Self::load(path)
    }

    /// Load the cache from an explicit path. Unreadable or invalid files
    /// yield an empty cache.
    pub fn load(path: PathBuf) -> Self {
        let positions = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| toml::from_str::<CacheFile>(&raw).ok())
            .map(|file| file.positions)
            .unwrap_or_default();
        Self { path, positions }
    }

    /// Remembered change-id for a repository.
    pub fn get(&self, repo: &Path) -> Option<&str> {
        self.positions
            .get(&repo.to_string_lossy().into_owned())
            .map(String::as_str)
    }

    /// Remember the cursor's change-id for a repository.
    pub fn set(&mut self, repo: &Path, change_id: impl Into<String>) {
        self.positions
            .insert(repo.to_string_lossy().into_owned(), change_id.into());
    }

    /// Write the cache back to disk. Best-effort.
    pub fn save(&self) {
        let file = CacheFile {
            positions: self.positions.clone(),
        };
        let Ok(raw) = toml::to_string(&file) else {
            return;
        };
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&self.path, raw) {
            tracing::debug!(error = %e, path = ?self.path, "scroll cache save failed");
        }
    }
}
