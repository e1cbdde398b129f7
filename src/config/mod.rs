//! Configuration loading and resolution.
//!
//! Precedence chain: built-in defaults -> config file -> environment
//! variables (`JJLV_*`) -> CLI arguments. Each stage is a pure function
//! over the previous one, applied in `main`.
//!
//! The config file is TOML at `~/.config/jjlv/config.toml` (or an explicit
//! `--config` path). A missing file is not an error; an unreadable or
//! invalid one is.

pub mod scroll_cache;

pub use scroll_cache::ScrollCache;

use crate::model::ConfigError;
use serde::Deserialize;
use std::path::PathBuf;

/// Default number of rows per streamed batch.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Raw, partial configuration as read from the TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Default revset for the graph log.
    pub revset: Option<String>,
    /// Rows per streamed batch.
    pub batch_size: Option<usize>,
    /// Tracing log file path.
    pub log_file_path: Option<PathBuf>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Default revset, `None` for jj's own default.
    pub revset: Option<String>,
    /// Rows per streamed batch.
    pub batch_size: usize,
    /// Tracing log file path.
    pub log_file_path: PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            revset: None,
            batch_size: DEFAULT_BATCH_SIZE,
            log_file_path: default_log_path(),
        }
    }
}

fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("jjlv")
        .join("jjlv.log")
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("jjlv").join("config.toml"))
}

/// Load the config file from an explicit path or the default location.
///
/// Returns `Ok(None)` when no file exists; explicit paths that fail to
/// read are errors, as are TOML syntax errors.
pub fn load_config(explicit: Option<PathBuf>) -> Result<Option<ConfigFile>, ConfigError> {
    let path = match explicit.or_else(default_config_path) {
        Some(path) => path,
        None => return Ok(None),
    };
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let file: ConfigFile = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
        path,
        message: e.to_string(),
    })?;
    Ok(Some(file))
}

/// Merge file values over the built-in defaults.
pub fn merge_config(file: Option<ConfigFile>) -> ResolvedConfig {
    let mut resolved = ResolvedConfig::default();
    if let Some(file) = file {
        if let Some(revset) = file.revset {
            resolved.revset = Some(revset);
        }
        if let Some(batch_size) = file.batch_size {
            resolved.batch_size = batch_size.max(1);
        }
        if let Some(path) = file.log_file_path {
            resolved.log_file_path = path;
        }
    }
    resolved
}

/// Apply `JJLV_REVSET` and `JJLV_BATCH_SIZE` overrides.
pub fn apply_env_overrides(mut config: ResolvedConfig) -> ResolvedConfig {
    if let Ok(revset) = std::env::var("JJLV_REVSET") {
        if !revset.is_empty() {
            config.revset = Some(revset);
        }
    }
    if let Ok(batch) = std::env::var("JJLV_BATCH_SIZE") {
        if let Ok(parsed) = batch.parse::<usize>() {
            config.batch_size = parsed.max(1);
        }
    }
    config
}

/// Apply CLI overrides, the final stage of the chain.
pub fn apply_cli_overrides(
    mut config: ResolvedConfig,
    revset: Option<String>,
    batch_size: Option<usize>,
) -> ResolvedConfig {
    if let Some(revset) = revset {
        config.revset = Some(revset);
    }
    if let Some(batch_size) = batch_size {
        config.batch_size = batch_size.max(1);
    }
    config
}
