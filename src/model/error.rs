//! Error taxonomy.
//!
//! Structured errors via `thiserror`, composing through `From` and `?`.
//! The split mirrors the recovery strategy:
//!
//! - [`CommandError`] — the `jj` subprocess failed to spawn, exited
//!   non-zero, or its output stream broke. Non-fatal to the UI: the
//!   previous snapshot stays on screen with an out-of-band error
//!   indicator.
//! - [`ConfigError`] — unreadable or syntactically invalid configuration.
//!   Fatal at startup.
//! - Terminal I/O errors — fatal; the terminal is restored and the error
//!   propagates out of the event loop.
//!
//! Malformed graph *lines* are never errors: a line that fails the
//! revision predicate is an ordinary continuation line. A consumer-
//! requested parser stop is a silent, normal termination path.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    /// A `jj` invocation failed.
    #[error("jj invocation failed: {0}")]
    Command(#[from] CommandError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The tracing subscriber could not be initialized.
    #[error("logging setup failed: {0}")]
    Logging(#[from] crate::logging::LoggingError),

    /// Terminal or rendering I/O failure.
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

/// Failures of the external `jj` subprocess.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The binary could not be started at all (missing from PATH,
    /// permission denied, ...).
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The process ran but exited unsuccessfully. Carries the captured
    /// stderr so the status line can show something actionable.
    #[error("jj exited with status {code}: {stderr}")]
    Failed {
        /// Exit code, or -1 when terminated by a signal.
        code: i32,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// Reading the process output failed.
    #[error("failed to read jj output: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures loading or parsing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config {path:?}: {source}")]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for the expected schema.
    #[error("invalid config {path:?}: {message}")]
    Parse {
        /// Path that failed.
        path: PathBuf,
        /// TOML parser diagnostic.
        message: String,
    },
}
