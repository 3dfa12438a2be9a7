//! Domain-specific error types for the logging service.
//!
//! Internal modules return typed errors ([`ConfigError`], [`SinkError`],
//! [`LifecycleError`]).  None of them ever reaches a caller of
//! [`LogService::log`](crate::LogService::log): file-system failures are
//! absorbed at the sink boundary and reported through the console path.
//! The binary collects startup failures in [`FaultLogError`] and converts
//! them to [`anyhow::Error`] with `?`.
//!
//! # Error hierarchy
//!
//! ```text
//! FaultLogError
//! ├── Config(ConfigError)      - config file parsing, alternate path validation
//! ├── Sink(SinkError)          - open, write, close of the log file
//! └── Lifecycle(LifecycleError)- illegal state transitions, writer thread
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the logging service.
#[derive(Error, Debug)]
pub enum FaultLogError {
    /// Configuration-related error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Log file error.
    #[error("Log file error: {0}")]
    Sink(#[from] SinkError),

    /// Lifecycle transition error.
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

/// Errors that arise from loading and validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The alternate log path was rejected.
    #[error("Invalid alternate log path '{}': {reason}", path.display())]
    InvalidAlternatePath {
        /// Path as supplied by the caller.
        path: PathBuf,
        /// Human-readable reason for the rejection.
        reason: String,
    },

    /// The application name is empty, so no log file name can be derived.
    #[error("Application name is empty; cannot derive a log file name")]
    MissingAppName,

    /// The config file could not be parsed.
    #[error("Invalid config file {}: {message}", path.display())]
    Parse {
        /// Path to the config file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// An I/O error occurred while reading a config file.
    #[error("IO error reading config file {}: {source}", path.display())]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors raised by a [`Sink`](crate::logging::Sink) implementation.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The log file (or its directory) could not be opened or created.
    #[error("Cannot open log file {}: {source}", path.display())]
    Open {
        /// Path the sink tried to open.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Another handle holds the exclusive write lock on the file.
    #[error("Log file {} is locked by another writer", path.display())]
    Locked {
        /// Path of the locked file.
        path: PathBuf,
    },

    /// Appending or flushing bytes failed.
    #[error("Write to log file failed: {0}")]
    Write(#[source] std::io::Error),

    /// Flushing on close failed.
    #[error("Closing log file failed: {0}")]
    Close(#[source] std::io::Error),

    /// A write was attempted with no open file.
    #[error("Log file is not open")]
    NotOpen,
}

/// Errors raised by lifecycle transitions of the service.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// `initialize` was called on a service that is already running.
    #[error("Logging service is already initialized")]
    AlreadyInitialized,

    /// The operation requires a running service.
    #[error("Logging service is not initialized")]
    NotInitialized,

    /// The service has been shut down and cannot be restarted.
    #[error("Logging service has already been disposed")]
    AlreadyDisposed,

    /// A state flag change that would break a lifecycle invariant.
    #[error("Illegal lifecycle transition: {0}")]
    InvalidTransition(&'static str),

    /// The writer thread could not be spawned.
    #[error("Failed to spawn writer thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The writer did not finish draining within the configured timeout.
    #[error("Writer did not drain within {0} ms")]
    ShutdownTimedOut(u64),
}
