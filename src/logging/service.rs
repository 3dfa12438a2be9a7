//! The public logging service: lifecycle, log calls and failure reports.
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::exception::ExceptionInfo;
use super::hooks::{GuardedScope, take_last_panic};
use super::pipeline::{INTERNAL_TARGET, Pipeline};
use super::sink::{FileSink, Sink};
use super::state::StateSnapshot;
use super::types::{LogRecord, Severity};
use super::utils::format_template;
use super::writer::{WRITER_THREAD_NAME, WriterLoop};
use crate::config::LogConfig;
use crate::error::LifecycleError;

/// How often a timed shutdown checks whether the writer has exited.
const SHUTDOWN_POLL: Duration = Duration::from_millis(2);

/// Values a guarded action may return, mapped to a process exit code.
pub trait GuardedOutput {
    /// Exit code for a successful run.
    fn exit_code(self) -> i32;
}

impl GuardedOutput for () {
    fn exit_code(self) -> i32 {
        0
    }
}

impl GuardedOutput for bool {
    /// `true` maps to 0, `false` to 1.
    fn exit_code(self) -> i32 {
        i32::from(!self)
    }
}

/// Process-wide failure capture and asynchronous file logging.
///
/// A service is inert until [`initialize`](Self::initialize) starts its
/// writer thread, and is finished for good after
/// [`begin_shutdown`](Self::begin_shutdown). Log calls never block on disk
/// I/O and never fail; when the file cannot be used they still reach the
/// `tracing` console path.
///
/// Share it through an [`Arc`] to hand it to
/// [`install_panic_hook`](crate::install_panic_hook) and
/// [`spawn_reported`](crate::spawn_reported).
pub struct LogService {
    pipeline: Arc<Pipeline>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for LogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogService")
            .field("state", &self.snapshot())
            .field("queued", &self.pipeline.queue.len())
            .finish_non_exhaustive()
    }
}

impl Default for LogService {
    fn default() -> Self {
        Self::new()
    }
}

impl LogService {
    /// An uninitialized service with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipeline: Arc::new(Pipeline::new(LogConfig::default())),
            worker: Mutex::new(None),
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `config` and start the writer thread on a [`FileSink`].
    ///
    /// Returns once the writer has made its first attempt to open the file.
    ///
    /// # Errors
    ///
    /// Returns a [`LifecycleError`] if the service is already running or
    /// disposed, or the writer thread cannot be spawned.
    pub fn initialize(&self, config: LogConfig) -> Result<(), LifecycleError> {
        self.initialize_with_sink(config, Box::new(FileSink::new()))
    }

    /// Like [`initialize`](Self::initialize) with a caller-supplied sink.
    ///
    /// # Errors
    ///
    /// See [`initialize`](Self::initialize).
    pub fn initialize_with_sink(
        &self,
        config: LogConfig,
        sink: Box<dyn Sink>,
    ) -> Result<(), LifecycleError> {
        self.pipeline.state.mark_initialized()?;
        let poll_interval = config.poll_interval();
        self.pipeline.apply_config(config);

        let writer = WriterLoop::new(Arc::clone(&self.pipeline), sink, poll_interval);
        let (ready_tx, ready_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(WRITER_THREAD_NAME.to_string())
            .spawn(move || writer.run(ready_tx))
            .map_err(|err| {
                self.pipeline.state.revert_initialized();
                LifecycleError::Spawn(err)
            })?;
        ready_rx.recv().ok();
        *self.worker() = Some(handle);
        tracing::debug!(target: INTERNAL_TARGET, "logging service initialized");
        Ok(())
    }

    /// Stop accepting the service as running, drain every queued record to
    /// the file and wait for the writer to exit.
    ///
    /// Calling it again, from any thread, waits for the same drain and then
    /// returns `Ok`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotInitialized`] if the service never started, and
    /// [`LifecycleError::ShutdownTimedOut`] if `shutdown_timeout_ms` is set
    /// and the writer is still draining when it expires.
    pub fn begin_shutdown(&self) -> Result<(), LifecycleError> {
        let state = &self.pipeline.state;
        if state.is_disposed() {
            return Ok(());
        }
        if let Err(err) = state.begin_disposing()
            && !state.is_disposing()
        {
            return if state.is_disposed() { Ok(()) } else { Err(err) };
        }
        let timeout = self.pipeline.config().shutdown_timeout();
        let handle = self.worker().take();
        match handle {
            Some(handle) => self.join_writer(handle, timeout),
            None => self.wait_for_disposed(timeout),
        }
    }

    fn join_writer(
        &self,
        handle: JoinHandle<()>,
        timeout: Option<Duration>,
    ) -> Result<(), LifecycleError> {
        if let Some(timeout) = timeout {
            let deadline = Instant::now() + timeout;
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    *self.worker() = Some(handle);
                    return Err(timed_out(timeout));
                }
                thread::sleep(SHUTDOWN_POLL);
            }
        }
        if handle.join().is_err() {
            tracing::error!(target: INTERNAL_TARGET, "writer thread panicked");
        }
        tracing::debug!(target: INTERNAL_TARGET, "logging service disposed");
        Ok(())
    }

    /// Wait for a shutdown another thread is joining.
    fn wait_for_disposed(&self, timeout: Option<Duration>) -> Result<(), LifecycleError> {
        let deadline = timeout.map(|t| (Instant::now() + t, t));
        while !self.pipeline.state.is_disposed() {
            if let Some((deadline, timeout)) = deadline
                && Instant::now() >= deadline
            {
                return Err(timed_out(timeout));
            }
            thread::sleep(SHUTDOWN_POLL);
        }
        Ok(())
    }

    /// Log `message` at `severity`. Debug records are dropped unless debug
    /// logging is on.
    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        self.pipeline.log(severity, message.into());
    }

    /// Log `template` with `{0}`, `{1}` … replaced by `args`.
    ///
    /// See [`format_template`](crate::format_template) for how absent or
    /// blank arguments are shown.
    pub fn log_template(&self, severity: Severity, template: &str, args: &[Option<&str>]) {
        self.pipeline.log(severity, format_template(template, args));
    }

    /// Log a failure on one line: message, causes, origin and stack.
    pub fn log_exception(&self, exception: &ExceptionInfo, terminating: bool) {
        self.pipeline.log_exception(exception, terminating);
    }

    /// Log an [`anyhow::Error`] with its cause chain as a non-terminating
    /// failure.
    pub fn log_error(&self, err: &anyhow::Error) {
        self.pipeline
            .log_exception(&ExceptionInfo::from_error(err), false);
    }

    /// Report a failure nobody handled.
    ///
    /// Logged at `CriticalError` when `terminating`, else `GenericError`,
    /// then passed to the "exception observed" listeners. A report of the
    /// same failure as the previous one is ignored. Returns whether this
    /// call reported it.
    pub fn report_unhandled(&self, exception: &ExceptionInfo, terminating: bool) -> bool {
        self.pipeline.report_unhandled(exception, terminating)
    }

    /// Run `action`, turning an error or panic into a log line and an exit
    /// code.
    ///
    /// On failure logs `<fallback>: <message>` at `GenericError` and returns
    /// the failure's native code (never 0). On success returns
    /// [`GuardedOutput::exit_code`]: 0 for `()`, and 0 or 1 for `bool`.
    /// Panics inside `action` are not reported as unhandled.
    pub fn run_guarded<R, F>(&self, fallback: &str, action: F) -> i32
    where
        R: GuardedOutput,
        F: FnOnce() -> anyhow::Result<R>,
    {
        let outcome = {
            let _scope = GuardedScope::enter();
            panic::catch_unwind(AssertUnwindSafe(action))
        };
        let failure = match outcome {
            Ok(Ok(value)) => return value.exit_code(),
            Ok(Err(err)) => ExceptionInfo::from_error(&err),
            Err(payload) => take_last_panic()
                .unwrap_or_else(|| ExceptionInfo::from_panic_payload(payload.as_ref())),
        };
        self.log(
            Severity::GenericError,
            format!("{fallback}: {}", failure.message()),
        );
        failure.code()
    }

    /// Call `listener` with every record after it is queued.
    ///
    /// A listener that fails or panics disables the channel for good.
    pub fn on_entry_added(
        &self,
        listener: impl Fn(&LogRecord) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        self.pipeline.entry_added.subscribe(listener);
    }

    /// Call `listener` with every reported unhandled failure.
    ///
    /// A listener that fails or panics disables the channel for good.
    pub fn on_exception_observed(
        &self,
        listener: impl Fn(&ExceptionInfo) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        self.pipeline.exception_observed.subscribe(listener);
    }

    /// Turn writing to disk on or off. Takes effect at the writer's next
    /// pass; records logged while off are not written later.
    pub fn set_file_logging(&self, enabled: bool) {
        self.pipeline.set_file_logging(enabled);
    }

    /// Accept or drop `Debug` records from now on.
    pub fn set_debug_logging(&self, enabled: bool) {
        self.pipeline.set_debug_logging(enabled);
    }

    /// Log to `path` instead of the dated file, or return to the dated file
    /// with `None`.
    ///
    /// An invalid path is logged at `GenericError` and `false` returned;
    /// the current file stays in use.
    pub fn set_alternate_path(&self, path: Option<&Path>) -> bool {
        self.pipeline.set_alternate_path(path)
    }

    /// File the writer would open now, or `None` when file logging is off.
    #[must_use]
    pub fn current_log_path(&self) -> Option<PathBuf> {
        self.pipeline.target().map(|(path, _)| path)
    }

    /// Copy of the lifecycle flags.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        self.pipeline.state.snapshot()
    }

    /// Number of records waiting for the writer.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pipeline.queue.len()
    }

    /// Whether the writer is inside a file write right now.
    #[must_use]
    pub fn is_writing(&self) -> bool {
        self.pipeline.state.is_accessing_file()
    }
}

fn timed_out(timeout: Duration) -> LifecycleError {
    LifecycleError::ShutdownTimedOut(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
}

impl Drop for LogService {
    fn drop(&mut self) {
        let state = &self.pipeline.state;
        if (state.is_initialized() || state.is_disposing())
            && let Err(err) = self.begin_shutdown()
        {
            tracing::warn!(target: INTERNAL_TARGET, error = %err, "shutdown on drop incomplete");
        }
    }
}
