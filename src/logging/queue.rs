//! Producer-side entry queue and the writer's byte staging buffer.
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::types::LogRecord;

#[derive(Debug, Default)]
struct QueueInner {
    records: VecDeque<LogRecord>,
    /// Set once by the writer on its final drain; later records are refused.
    sealed: bool,
}

/// Unbounded FIFO of records waiting for the writer thread.
///
/// Producers call [`push`](Self::push) from any thread; only the writer
/// calls [`drain_all`](Self::drain_all) and [`seal_if_empty`](Self::seal_if_empty).
/// The lock is held only for the push or the swap, never during I/O.
#[derive(Debug, Default)]
pub struct EntryQueue {
    inner: Mutex<QueueInner>,
}

impl EntryQueue {
    /// Create an empty, unsealed queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a record. Returns `false` (and drops the record) once sealed.
    pub fn push(&self, record: LogRecord) -> bool {
        let mut inner = self.lock();
        if inner.sealed {
            return false;
        }
        inner.records.push_back(record);
        true
    }

    /// Take every queued record in arrival order, leaving the queue empty.
    pub fn drain_all(&self) -> Vec<LogRecord> {
        let mut inner = self.lock();
        inner.records.drain(..).collect()
    }

    /// Seal the queue if it is empty.
    ///
    /// Returns `true` when the queue was empty and is now sealed.  Checking
    /// and sealing happen under one lock acquisition, so a record either
    /// lands before the seal (and the writer sees it) or is refused.
    pub fn seal_if_empty(&self) -> bool {
        let mut inner = self.lock();
        if inner.records.is_empty() {
            inner.sealed = true;
        }
        inner.sealed
    }

    /// Number of records currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether no records are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Whether the final drain has sealed the queue.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }
}

/// Staging area for serialized bytes between formatting and the file write.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    bytes: Mutex<Vec<u8>>,
}

impl ByteBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append serialized bytes.
    pub fn append(&self, data: &[u8]) {
        self.lock().extend_from_slice(data);
    }

    /// Take all staged bytes, leaving the buffer empty.
    pub fn drain_all(&self) -> Vec<u8> {
        std::mem::take(&mut *self.lock())
    }

    /// Whether no bytes are staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
