//! Process-wide failure capture and asynchronous daily log files.
//!
//! A [`LogService`] accepts log calls from any thread without blocking on
//! disk I/O.  A single background writer drains the queued records into
//! `<app_name>_<YYYY-MM-DD>.log`, and every accepted record is also echoed
//! to [`tracing`] so the console keeps working when the file cannot be
//! written.
//!
//! Unhandled failures reach the service through [`install_panic_hook`] and
//! [`spawn_reported`]; [`LogService::run_guarded`] turns a failing action
//! into a log line and an exit code.
//!
//! The crate is organised into three layers:
//!
//! - **[`config`]**: `LogConfig`, loaded from TOML and validated
//! - **[`logging`]**: the service, its writer thread, sink and hooks
//! - **[`error`]**: typed errors for configuration, the sink and lifecycle
//!
//! ```no_run
//! use std::sync::Arc;
//! use faultlog::{LogConfig, LogService, Severity};
//!
//! let service = Arc::new(LogService::new());
//! service.initialize(LogConfig::new("editor", "/tmp/editor-logs"))?;
//! faultlog::install_panic_hook(&service);
//! service.log(Severity::Info, "started");
//! service.begin_shutdown()?;
//! # Ok::<(), faultlog::error::LifecycleError>(())
//! ```
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::LogConfig;
pub use logging::{
    ExceptionId, ExceptionInfo, FAILURE_CODE, FileSink, GuardedOutput, LogRecord, LogService,
    OpenOutcome, Severity, Sink, StateSnapshot, format_template, install_panic_hook,
    set_thread_label, spawn_reported,
};
