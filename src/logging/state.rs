//! Lifecycle flags of one logging service and their legal transitions.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::LifecycleError;

#[derive(Debug, Default, Clone, Copy)]
struct Flags {
    initialized: bool,
    disposing: bool,
    disposed: bool,
    file_open: bool,
    file_not_accessible: bool,
}

/// Point-in-time copy of the lifecycle flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct StateSnapshot {
    /// The writer thread is running and accepting work.
    pub initialized: bool,
    /// Shutdown has begun; the writer is draining.
    pub disposing: bool,
    /// The writer has exited and released the file.
    pub disposed: bool,
    /// The sink currently holds an open file.
    pub file_open: bool,
    /// The writer is inside a file write.
    pub accessing_file: bool,
    /// File logging has been permanently disabled after a failure.
    pub file_not_accessible: bool,
}

/// Process-wide lifecycle state of a [`LogService`](crate::LogService).
///
/// Flags change only through the named transitions below, each of which
/// rejects combinations that would break an invariant:
///
/// - `disposed` implies `!file_open`
/// - `disposing` is cleared only together with setting `disposed`
/// - `file_not_accessible` never resets
///
/// `accessing_file` lives outside the mutex so producers can read it
/// without contending with the writer.
#[derive(Debug, Default)]
pub struct LifecycleState {
    flags: Mutex<Flags>,
    accessing_file: AtomicBool,
}

/// Clears the `accessing_file` flag when dropped.
#[derive(Debug)]
pub struct FileAccessGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FileAccessGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl LifecycleState {
    /// Fresh state: nothing set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enter the running state.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::AlreadyInitialized`] if running or shutting down,
    /// [`LifecycleError::AlreadyDisposed`] after shutdown completed.
    pub fn mark_initialized(&self) -> Result<(), LifecycleError> {
        let mut flags = self.lock();
        if flags.disposed {
            return Err(LifecycleError::AlreadyDisposed);
        }
        if flags.initialized || flags.disposing {
            return Err(LifecycleError::AlreadyInitialized);
        }
        flags.initialized = true;
        Ok(())
    }

    /// Undo [`mark_initialized`](Self::mark_initialized) when the writer
    /// thread could not be started.
    pub(crate) fn revert_initialized(&self) {
        self.lock().initialized = false;
    }

    /// Start shutdown: set `disposing`, clear `initialized`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotInitialized`] unless the service is running.
    pub fn begin_disposing(&self) -> Result<(), LifecycleError> {
        let mut flags = self.lock();
        if flags.disposed {
            return Err(LifecycleError::AlreadyDisposed);
        }
        if !flags.initialized {
            return Err(LifecycleError::NotInitialized);
        }
        flags.initialized = false;
        flags.disposing = true;
        Ok(())
    }

    /// Finish shutdown: clear `disposing` and set `disposed` in one step.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidTransition`] if shutdown was not begun or
    /// the file is still open.
    pub fn mark_disposed(&self) -> Result<(), LifecycleError> {
        let mut flags = self.lock();
        if !flags.disposing {
            return Err(LifecycleError::InvalidTransition(
                "disposed requires disposing",
            ));
        }
        if flags.file_open {
            return Err(LifecycleError::InvalidTransition(
                "disposed requires the file to be closed",
            ));
        }
        flags.disposing = false;
        flags.disposed = true;
        Ok(())
    }

    /// Record that the sink opened the log file.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidTransition`] once file logging is disabled
    /// or the service is disposed.
    pub fn mark_file_open(&self) -> Result<(), LifecycleError> {
        let mut flags = self.lock();
        if flags.file_not_accessible {
            return Err(LifecycleError::InvalidTransition(
                "file was marked not accessible",
            ));
        }
        if flags.disposed {
            return Err(LifecycleError::InvalidTransition(
                "cannot open the file after disposal",
            ));
        }
        flags.file_open = true;
        Ok(())
    }

    /// Record that the sink closed the log file. Always legal.
    pub fn mark_file_closed(&self) {
        self.lock().file_open = false;
    }

    /// Permanently disable file logging after an open or write failure.
    ///
    /// Returns `true` the first time, `false` if already disabled.
    pub fn mark_file_unavailable(&self) -> bool {
        let mut flags = self.lock();
        flags.file_open = false;
        !std::mem::replace(&mut flags.file_not_accessible, true)
    }

    /// Set `accessing_file` for the lifetime of the returned guard.
    pub fn begin_file_access(&self) -> FileAccessGuard<'_> {
        self.accessing_file.store(true, Ordering::Release);
        FileAccessGuard {
            flag: &self.accessing_file,
        }
    }

    /// Whether `initialize` has completed and shutdown has not begun.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Whether shutdown has begun but not completed.
    #[must_use]
    pub fn is_disposing(&self) -> bool {
        self.lock().disposing
    }

    /// Whether shutdown has completed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Whether the sink holds an open file.
    #[must_use]
    pub fn is_file_open(&self) -> bool {
        self.lock().file_open
    }

    /// Whether file logging was permanently disabled.
    #[must_use]
    pub fn is_file_not_accessible(&self) -> bool {
        self.lock().file_not_accessible
    }

    /// Whether the writer is inside a file write.
    #[must_use]
    pub fn is_accessing_file(&self) -> bool {
        self.accessing_file.load(Ordering::Acquire)
    }

    /// Copy every flag at once.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        let flags = *self.lock();
        StateSnapshot {
            initialized: flags.initialized,
            disposing: flags.disposing,
            disposed: flags.disposed,
            file_open: flags.file_open,
            accessing_file: self.is_accessing_file(),
            file_not_accessible: flags.file_not_accessible,
        }
    }
}
