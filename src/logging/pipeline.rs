//! State shared between producer threads and the writer thread.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Local;

use super::exception::{ExceptionId, ExceptionInfo};
use super::observers::ObserverList;
use super::queue::{ByteBuffer, EntryQueue};
use super::state::LifecycleState;
use super::types::{LogRecord, Severity};
use crate::config::LogConfig;
use crate::error::ConfigError;

/// `tracing` target for echoed log records.
pub(crate) const RECORD_TARGET: &str = "faultlog";
/// `tracing` target for the pipeline's own diagnostics.
pub(crate) const INTERNAL_TARGET: &str = "faultlog::internal";

#[derive(Debug)]
struct Settings {
    config: LogConfig,
    /// Bumped whenever the sink has to be closed and reopened.
    generation: u64,
}

/// The queue, buffer, flags and listeners behind one service.
#[derive(Debug)]
pub(crate) struct Pipeline {
    pub(crate) state: LifecycleState,
    pub(crate) queue: EntryQueue,
    pub(crate) buffer: ByteBuffer,
    include_debug: AtomicBool,
    settings: Mutex<Settings>,
    pub(crate) entry_added: ObserverList<LogRecord>,
    pub(crate) exception_observed: ObserverList<ExceptionInfo>,
    last_exception: Mutex<Option<ExceptionId>>,
}

/// Send a record to the console path.
fn echo(record: &LogRecord) {
    let thread = record.thread_name().unwrap_or("-");
    let message = record.message();
    match record.severity() {
        Severity::Debug => tracing::debug!(target: RECORD_TARGET, thread, "{message}"),
        Severity::Info => tracing::info!(target: RECORD_TARGET, thread, "{message}"),
        Severity::Warning => tracing::warn!(target: RECORD_TARGET, thread, "{message}"),
        Severity::GenericError | Severity::CriticalError => {
            tracing::error!(target: RECORD_TARGET, thread, severity = record.severity().tag(), "{message}");
        }
    }
}

impl Pipeline {
    pub(crate) fn new(config: LogConfig) -> Self {
        Self {
            state: LifecycleState::new(),
            queue: EntryQueue::new(),
            buffer: ByteBuffer::new(),
            include_debug: AtomicBool::new(config.include_debug),
            settings: Mutex::new(Settings {
                config,
                generation: 0,
            }),
            entry_added: ObserverList::new("log entry added"),
            exception_observed: ObserverList::new("exception observed"),
            last_exception: Mutex::new(None),
        }
    }

    fn settings(&self) -> MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Capture and enqueue one record, then echo it and notify listeners.
    ///
    /// Once the queue is sealed nothing is echoed or notified.
    pub(crate) fn log(&self, severity: Severity, message: String) {
        if severity == Severity::Debug && !self.include_debug.load(Ordering::Acquire) {
            return;
        }
        if self.state.is_disposed() {
            return;
        }
        let record = LogRecord::capture(severity, message);
        let accepted = record.clone();
        if !self.queue.push(record) {
            return;
        }
        echo(&accepted);
        if self.entry_added.is_live()
            && let Some(reason) = self.entry_added.dispatch(&accepted)
        {
            self.listener_failed(self.entry_added.name(), &reason);
        }
    }

    /// Log one failure on a single line.
    pub(crate) fn log_exception(&self, exception: &ExceptionInfo, terminating: bool) {
        self.log(Severity::for_failure(terminating), exception.summary());
    }

    /// Log and broadcast an unhandled failure unless it was the last one
    /// reported. Returns whether it was reported.
    pub(crate) fn report_unhandled(&self, exception: &ExceptionInfo, terminating: bool) -> bool {
        {
            let mut last = self
                .last_exception
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *last == Some(exception.id()) {
                return false;
            }
            *last = Some(exception.id());
        }
        self.log_exception(exception, terminating);
        if let Some(reason) = self.exception_observed.dispatch(exception) {
            self.listener_failed(self.exception_observed.name(), &reason);
        }
        true
    }

    /// Deliver notifications parked by the panic hook.
    pub(crate) fn deliver_deferred(&self) {
        if let Some(reason) = self.entry_added.deliver_deferred() {
            self.listener_failed(self.entry_added.name(), &reason);
        }
        if let Some(reason) = self.exception_observed.deliver_deferred() {
            self.listener_failed(self.exception_observed.name(), &reason);
        }
    }

    fn listener_failed(&self, channel: &str, reason: &str) {
        tracing::warn!(target: INTERNAL_TARGET, channel, reason, "listener disabled");
        self.log(
            Severity::GenericError,
            format!("Listener for '{channel}' failed and was disabled: {reason}"),
        );
    }

    /// Install a configuration, dropping the parts that do not validate.
    pub(crate) fn apply_config(&self, mut config: LogConfig) {
        self.include_debug
            .store(config.include_debug, Ordering::Release);
        if let Some(path) = config.alternate_path.take() {
            match LogConfig::validate_alternate_path(&path) {
                Ok(()) => config.alternate_path = Some(path),
                Err(err) => self.log(Severity::GenericError, err.to_string()),
            }
        }
        if config.file_logging
            && config.alternate_path.is_none()
            && config.app_name.trim().is_empty()
        {
            self.log(Severity::GenericError, ConfigError::MissingAppName.to_string());
            config.file_logging = false;
        }
        let mut settings = self.settings();
        settings.config = config;
        settings.generation += 1;
    }

    pub(crate) fn set_file_logging(&self, enabled: bool) {
        let mut settings = self.settings();
        if settings.config.file_logging != enabled {
            settings.config.file_logging = enabled;
            settings.generation += 1;
        }
    }

    pub(crate) fn set_debug_logging(&self, enabled: bool) {
        self.include_debug.store(enabled, Ordering::Release);
        self.settings().config.include_debug = enabled;
    }

    /// Replace the alternate path; `None` returns to the dated file.
    pub(crate) fn set_alternate_path(&self, path: Option<&Path>) -> bool {
        if let Some(path) = path
            && let Err(err) = LogConfig::validate_alternate_path(path)
        {
            self.log(Severity::GenericError, err.to_string());
            return false;
        }
        let mut settings = self.settings();
        settings.config.alternate_path = path.map(Path::to_path_buf);
        settings.generation += 1;
        true
    }

    /// Path the sink should hold right now with its settings generation,
    /// or `None` when file logging is off.
    pub(crate) fn target(&self) -> Option<(PathBuf, u64)> {
        let settings = self.settings();
        if !settings.config.file_logging {
            return None;
        }
        settings
            .config
            .log_file_path(Local::now().date_naive())
            .ok()
            .map(|path| (path, settings.generation))
    }

    pub(crate) fn config(&self) -> LogConfig {
        self.settings().config.clone()
    }
}
