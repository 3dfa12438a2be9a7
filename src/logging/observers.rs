//! Best-effort notification channels with guarded dispatch.
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::exception::panic_message;
use super::hooks::{GuardedScope, in_panic_hook};

type Listener<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

thread_local! {
    /// Set while this thread is delivering a notification.
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as dispatching until dropped.
struct DispatchScope;

impl DispatchScope {
    /// Returns `None` when the thread is already dispatching.
    fn enter() -> Option<Self> {
        (!DISPATCHING.with(|d| d.replace(true))).then_some(Self)
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        DISPATCHING.with(|d| d.set(false));
    }
}

/// An explicit list of listeners for one kind of notification.
///
/// Each delivery runs inside a failure boundary.  The first listener that
/// returns an error or panics disables the whole channel for the rest of
/// the process; [`dispatch`](Self::dispatch) then reports the failure once
/// so the caller can log it.
///
/// Notifications raised while a listener is running on the same thread are
/// not delivered, so a listener that logs cannot recurse into itself.
/// Notifications raised inside the panic hook are parked and delivered by
/// the next [`deliver_deferred`](Self::deliver_deferred) call, since a panic
/// inside the hook would abort the process.
pub struct ObserverList<T> {
    name: &'static str,
    listeners: Mutex<Vec<Listener<T>>>,
    deferred: Mutex<Vec<T>>,
    disabled: AtomicBool,
}

impl<T: Clone> std::fmt::Debug for ObserverList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("name", &self.name)
            .field("listeners", &self.len())
            .field("disabled", &self.is_disabled())
            .finish_non_exhaustive()
    }
}

impl<T: Clone> ObserverList<T> {
    /// Create an empty channel identified by `name` in diagnostics.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Mutex::new(Vec::new()),
            deferred: Mutex::new(Vec::new()),
            disabled: AtomicBool::new(false),
        }
    }

    /// Channel name used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Register a listener.
    pub fn subscribe(&self, listener: impl Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a listener failure has shut this channel.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Whether a dispatch would reach anyone.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.is_disabled() && !self.is_empty()
    }

    /// Deliver `event` to every listener.
    ///
    /// Returns the failure description if this call disabled the channel.
    pub fn dispatch(&self, event: &T) -> Option<String> {
        if !self.is_live() {
            return None;
        }
        if in_panic_hook() {
            self.deferred
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
            return None;
        }
        let _scope = DispatchScope::enter()?;
        self.deliver(event)
    }

    /// Deliver notifications parked by [`dispatch`](Self::dispatch) from
    /// inside the panic hook.
    ///
    /// Returns the failure description if a delivery disabled the channel.
    pub fn deliver_deferred(&self) -> Option<String> {
        if in_panic_hook() {
            return None;
        }
        let parked = std::mem::take(
            &mut *self
                .deferred
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if parked.is_empty() {
            return None;
        }
        let _scope = DispatchScope::enter()?;
        parked.iter().find_map(|event| self.deliver(event))
    }

    fn deliver(&self, event: &T) -> Option<String> {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in snapshot {
            if self.is_disabled() {
                return None;
            }
            let outcome = {
                let _guard = GuardedScope::enter();
                panic::catch_unwind(AssertUnwindSafe(|| listener(event)))
            };
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(format!("{err:#}")),
                Err(payload) => Some(format!("panicked: {}", panic_message(payload.as_ref()))),
            };
            if let Some(reason) = failure {
                return (!self.disabled.swap(true, Ordering::AcqRel)).then_some(reason);
            }
        }
        None
    }
}
