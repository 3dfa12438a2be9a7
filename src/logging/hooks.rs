//! Adapters from the runtime's failure channels to [`LogService`].
//!
//! Two channels can observe the same panic: the process-wide panic hook,
//! and the thread boundary where [`spawn_reported`] catches the unwind.
//! The hook parks what it captured in a thread-local slot so the boundary
//! can report the *same* [`ExceptionInfo`], which the service then
//! de-duplicates.
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use super::exception::ExceptionInfo;
use super::service::LogService;

thread_local! {
    static IN_PANIC_HOOK: Cell<bool> = const { Cell::new(false) };
    static GUARD_DEPTH: Cell<u32> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<ExceptionInfo>> = const { RefCell::new(None) };
}

/// Whether the current thread is running the panic hook.
pub(crate) fn in_panic_hook() -> bool {
    IN_PANIC_HOOK.with(Cell::get)
}

/// Take the panic most recently captured by the hook on this thread.
pub(crate) fn take_last_panic() -> Option<ExceptionInfo> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

struct HookScope;

impl HookScope {
    fn enter() -> Self {
        IN_PANIC_HOOK.with(|f| f.set(true));
        Self
    }
}

impl Drop for HookScope {
    fn drop(&mut self) {
        IN_PANIC_HOOK.with(|f| f.set(false));
    }
}

/// Marks code whose panics are caught and handled by the caller, so the
/// hook records them without reporting them as unhandled.
pub(crate) struct GuardedScope;

impl GuardedScope {
    pub(crate) fn enter() -> Self {
        LAST_PANIC.with(|slot| slot.borrow_mut().take());
        GUARD_DEPTH.with(|d| d.set(d.get() + 1));
        Self
    }
}

impl Drop for GuardedScope {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

fn in_guarded_scope() -> bool {
    GUARD_DEPTH.with(Cell::get) > 0
}

fn on_main_thread() -> bool {
    thread::current().name() == Some("main")
}

/// Route panics to `service` as unhandled failures.
///
/// A panic on the main thread outside [`LogService::run_guarded`] is
/// reported as terminating.  The previously installed hook still runs
/// afterwards, so the default panic message is kept.  The hook holds only
/// a weak reference; once the service is dropped panics pass straight
/// through to the previous hook.
pub fn install_panic_hook(service: &Arc<LogService>) {
    let weak: Weak<LogService> = Arc::downgrade(service);
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        {
            let _scope = HookScope::enter();
            let exception = ExceptionInfo::from_panic(info);
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(exception.clone()));
            if !in_guarded_scope()
                && let Some(service) = weak.upgrade()
            {
                service.report_unhandled(&exception, on_main_thread());
            }
        }
        previous(info);
    }));
}

/// Spawn a named thread whose escaping panic is reported to `service`.
///
/// The panic is reported as non-terminating, since only this thread dies.
/// When the panic hook is installed it reports the same failure first and
/// the thread-boundary report is de-duplicated away.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be spawned.
pub fn spawn_reported<F, T>(
    service: &Arc<LogService>,
    name: &str,
    f: F,
) -> std::io::Result<JoinHandle<Option<T>>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let service = Arc::clone(service);
    thread::Builder::new().name(name.to_string()).spawn(move || {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Some(value),
            Err(payload) => {
                let exception = take_last_panic()
                    .unwrap_or_else(|| ExceptionInfo::from_panic_payload(payload.as_ref()));
                service.report_unhandled(&exception, false);
                None
            }
        }
    })
}
