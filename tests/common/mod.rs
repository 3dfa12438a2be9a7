// Shared helpers for integration tests.
//
// Provides a temporary log directory, a config pointing at it, and readers
// that parse the written log file back into `(SEVERITY) message` pairs.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use faultlog::LogConfig;

/// How long [`wait_until`] polls before giving up.
const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Application name used for every test log file.
pub const APP_NAME: &str = "itest";

/// An isolated log directory backed by a [`tempfile::TempDir`].
///
/// The directory is automatically deleted when dropped.
pub struct IntegrationTestContext {
    /// Temporary directory the service logs into.
    pub root: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Create a new, empty log directory.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        Self { root }
    }

    /// Path to the log directory.
    pub fn log_dir(&self) -> &Path {
        self.root.path()
    }

    /// Config logging into [`log_dir`](Self::log_dir) with debug records on
    /// and a fast writer poll.
    pub fn config(&self) -> LogConfig {
        LogConfig {
            include_debug: true,
            poll_interval_ms: 1,
            ..LogConfig::new(APP_NAME, self.log_dir())
        }
    }

    /// Every file in the log directory, sorted.
    pub fn log_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(self.log_dir())
            .expect("read log dir")
            .map(|entry| entry.expect("dir entry").path())
            .collect();
        files.sort();
        files
    }

    /// Contents of the only log file in the directory.
    pub fn read_log(&self) -> String {
        let files = self.log_files();
        assert_eq!(files.len(), 1, "expected exactly one log file: {files:?}");
        read(&files[0])
    }
}

/// Contents of `path` as UTF-8.
pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("read log file")
}

/// Strip the timestamp and thread segment: `(SEVERITY) message` per line.
pub fn entries(text: &str) -> Vec<String> {
    text.split_terminator("\r\n")
        .map(|line| {
            let (_, rest) = line.split_once(" (").expect("line has a severity");
            format!("({rest}")
        })
        .collect()
}

/// [`entries`] joined with newlines, for inline snapshots.
pub fn entries_text(text: &str) -> String {
    entries(text).join("\n")
}

/// Poll `condition` until it holds, panicking after a few seconds.
pub fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT_LIMIT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}
