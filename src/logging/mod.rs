//! Tracing subscriber initialization.
//!
//! The TUI owns the terminal, so diagnostics go to a file; watch them with
//! `tail -f` in another terminal. `RUST_LOG` controls the filter, default
//! `info`.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Logging initialization failures.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log directory could not be created.
    #[error("failed to create log directory {path:?}: {source}")]
    DirectoryCreation {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The log path has no usable file name.
    #[error("invalid log file path: {0:?}")]
    InvalidPath(PathBuf),

    /// A subscriber is already installed.
    #[error("tracing subscriber already initialized")]
    SubscriberAlreadySet,
}

/// Install the file-backed tracing subscriber.
///
/// Creates the parent directory if needed. No ANSI in the file.
pub fn init(log_path: &Path) -> Result<(), LoggingError> {
    use tracing_subscriber::EnvFilter;

    let parent = log_path
        .parent()
        .ok_or_else(|| LoggingError::InvalidPath(log_path.to_path_buf()))?;
    std::fs::create_dir_all(parent).map_err(|source| LoggingError::DirectoryCreation {
        path: parent.to_path_buf(),
        source,
    })?;

    let file_name = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LoggingError::InvalidPath(log_path.to_path_buf()))?;

    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(file_appender)
        .with_ansi(false)
        .try_init()
        .map_err(|_| LoggingError::SubscriberAlreadySet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial(tracing_init)]
    fn init_creates_missing_log_directory() {
        let test_dir = std::env::temp_dir().join("jjlv_test_logs_create");
        let log_file = test_dir.join("jjlv.log");
        let _ = fs::remove_dir_all(&test_dir);

        // May fail with SubscriberAlreadySet when another test installed
        // one first; the directory is created either way.
        let _ = init(&log_file);

        assert!(test_dir.exists());
        let _ = fs::remove_dir_all(&test_dir);
    }

    #[test]
    #[serial(tracing_init)]
    fn init_accepts_existing_directory() {
        let test_dir = std::env::temp_dir().join("jjlv_test_logs_exists");
        let log_file = test_dir.join("jjlv.log");
        let _ = fs::create_dir_all(&test_dir);

        let _ = init(&log_file);

        assert!(test_dir.exists());
        let _ = fs::remove_dir_all(&test_dir);
    }

    #[test]
    #[serial(tracing_init)]
    fn init_rejects_path_without_parent() {
        let result = init(Path::new("/"));
        assert!(matches!(result, Err(LoggingError::InvalidPath(_))));
    }
}
