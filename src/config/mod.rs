//! Service configuration: where the log goes and what it contains.
pub mod toml_loader;

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::logging::dated_file_name;

/// Default writer poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5;

/// Extensions accepted for an alternate log path (compared case-insensitively).
const ALTERNATE_EXTENSIONS: &[&str] = &["log", "txt"];

/// Return `$XDG_CACHE_HOME/<app>/` (or `~/.cache/<app>/`) without creating it.
#[must_use]
pub fn default_log_dir(app_name: &str) -> PathBuf {
    let cache_dir = std::env::var("XDG_CACHE_HOME").map_or_else(
        |_| {
            std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .map_or_else(|_| PathBuf::from("."), PathBuf::from)
                .join(".cache")
        },
        PathBuf::from,
    );
    cache_dir.join(app_name)
}

/// Settings for one [`LogService`](crate::LogService).
///
/// Loaded from TOML with [`LogConfig::load`]; every field is optional.
///
/// ```toml
/// app_name = "editor"
/// directory = "/var/log/editor"
/// include_debug = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Prefix of the daily file name `<app_name>_<YYYY-MM-DD>.log`.
    pub app_name: String,
    /// Directory holding the daily files.
    pub directory: PathBuf,
    /// Exact file to log to instead of the dated file in `directory`.
    pub alternate_path: Option<PathBuf>,
    /// Whether records are written to disk at all.
    pub file_logging: bool,
    /// Whether `Debug` records are accepted.
    pub include_debug: bool,
    /// How long the idle writer sleeps between polls.
    pub poll_interval_ms: u64,
    /// Upper bound for `begin_shutdown`; `None` waits for the full drain.
    pub shutdown_timeout_ms: Option<u64>,
}

impl Default for LogConfig {
    fn default() -> Self {
        let app_name = env!("CARGO_PKG_NAME").to_string();
        Self {
            directory: default_log_dir(&app_name),
            app_name,
            alternate_path: None,
            file_logging: true,
            include_debug: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            shutdown_timeout_ms: None,
        }
    }
}

impl LogConfig {
    /// Defaults with the given application name and log directory.
    #[must_use]
    pub fn new(app_name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            app_name: app_name.into(),
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Load from a TOML file. A missing file yields [`LogConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        toml_loader::load_config(path)
    }

    /// Check that `path` is usable as an alternate log file.
    ///
    /// The path must be absolute, name a file, contain no `..` component and
    /// end in `.log` or `.txt`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAlternatePath`] describing the first
    /// rule the path breaks.
    pub fn validate_alternate_path(path: &Path) -> Result<(), ConfigError> {
        let reject = |reason: &str| {
            Err(ConfigError::InvalidAlternatePath {
                path: path.to_path_buf(),
                reason: reason.to_string(),
            })
        };
        if !path.is_absolute() {
            return reject("path must be absolute");
        }
        if path.components().any(|c| c == Component::ParentDir) {
            return reject("path must not contain '..'");
        }
        if path.file_name().is_none() {
            return reject("path must name a file");
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension {
            Some(ext) if ALTERNATE_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
            _ => reject("extension must be .log or .txt"),
        }
    }

    /// Writer poll interval, at least one millisecond.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Shutdown timeout, if one is configured.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Option<Duration> {
        self.shutdown_timeout_ms.map(Duration::from_millis)
    }

    /// File the sink should open on `date`.
    ///
    /// The alternate path is used verbatim; otherwise the dated file in
    /// `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingAppName`] when no alternate path is set
    /// and the application name is blank.
    pub fn log_file_path(&self, date: NaiveDate) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.alternate_path {
            return Ok(path.clone());
        }
        let app_name = self.app_name.trim();
        if app_name.is_empty() {
            return Err(ConfigError::MissingAppName);
        }
        Ok(self.directory.join(dated_file_name(app_name, date)))
    }
}
