//! Failure capture and the asynchronous file logging pipeline.
//!
//! Producers call [`LogService`] from any thread; records pass through an
//! [`EntryQueue`] to a single writer thread that owns the [`Sink`].

mod exception;
mod hooks;
mod observers;
mod pipeline;
mod queue;
mod service;
mod sink;
mod state;
mod subscriber;
mod types;
mod utils;
mod writer;

pub use exception::{ExceptionId, ExceptionInfo, FAILURE_CODE, panic_message};
pub use hooks::{install_panic_hook, spawn_reported};
pub use observers::ObserverList;
pub use queue::{ByteBuffer, EntryQueue};
pub use service::{GuardedOutput, LogService};
pub use sink::{FileSink, OpenOutcome, Sink};
pub use state::{FileAccessGuard, LifecycleState, StateSnapshot};
pub use subscriber::init_subscriber;
pub use types::{LogRecord, Severity};
pub(crate) use utils::dated_file_name;
pub use utils::{EMPTY_ARG, NULL_ARG, WHITESPACE_ARG, format_template, set_thread_label, thread_label};
