//! The background writer: queue to buffer to sink.
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use super::exception::panic_message;
use super::pipeline::{INTERNAL_TARGET, Pipeline};
use super::sink::{OpenOutcome, Sink};
use super::types::Severity;
use crate::error::SinkError;

/// Name of the writer thread.
pub(crate) const WRITER_THREAD_NAME: &str = "faultlog-writer";

/// Result of one writer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    /// Something was drained or written; poll again immediately.
    Worked,
    /// Nothing to do; sleep before the next poll.
    Idle,
    /// Shutdown completed; the loop must exit.
    Finished,
}

/// Owns the sink and drives it from the shared [`Pipeline`].
pub(crate) struct WriterLoop {
    pipeline: Arc<Pipeline>,
    sink: Box<dyn Sink>,
    /// Settings generation the open sink belongs to.
    opened_generation: Option<u64>,
    poll_interval: Duration,
}

impl std::fmt::Debug for WriterLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterLoop")
            .field("sink_open", &self.sink.is_open())
            .field("opened_generation", &self.opened_generation)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl WriterLoop {
    pub(crate) fn new(pipeline: Arc<Pipeline>, sink: Box<dyn Sink>, poll_interval: Duration) -> Self {
        Self {
            pipeline,
            sink,
            opened_generation: None,
            poll_interval,
        }
    }

    /// Run until shutdown completes.
    ///
    /// `ready` is signalled after the first open attempt, so records logged
    /// once `initialize` returns land after the created/reopened line.
    pub(crate) fn run(mut self, ready: mpsc::Sender<()>) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.sync_sink_with_settings())) {
            tracing::error!(
                target: INTERNAL_TARGET,
                "log file setup panicked: {}",
                panic_message(payload.as_ref())
            );
        }
        ready.send(()).ok();
        drop(ready);

        loop {
            match panic::catch_unwind(AssertUnwindSafe(|| self.tick())) {
                Ok(Tick::Worked) => {}
                Ok(Tick::Idle) => thread::sleep(self.poll_interval),
                Ok(Tick::Finished) => break,
                Err(payload) => {
                    tracing::error!(
                        target: INTERNAL_TARGET,
                        "writer iteration panicked: {}",
                        panic_message(payload.as_ref())
                    );
                    thread::sleep(self.poll_interval);
                }
            }
        }
        tracing::debug!(target: INTERNAL_TARGET, "writer stopped");
    }

    /// One pass: listeners, sink state, one batch, shutdown check.
    pub(crate) fn tick(&mut self) -> Tick {
        self.pipeline.deliver_deferred();
        self.sync_sink_with_settings();
        let worked = self.drain_batch();
        if self.try_finish() {
            Tick::Finished
        } else if worked {
            Tick::Worked
        } else {
            Tick::Idle
        }
    }

    /// Close a sink that no longer matches the settings and open one that
    /// is wanted but missing.
    ///
    /// Records queued before the change are flushed to the old sink before
    /// it closes.
    fn sync_sink_with_settings(&mut self) {
        let target = self.pipeline.target();
        let wanted_generation = target.as_ref().map(|(_, generation)| *generation);
        if self.sink.is_open() && wanted_generation != self.opened_generation {
            self.drain_batch();
            if self.sink.is_open() {
                self.close_sink();
            }
        }
        let Some((path, generation)) = target else {
            return;
        };
        let state = &self.pipeline.state;
        if self.sink.is_open()
            || state.is_file_not_accessible()
            || state.is_disposing()
            || state.is_disposed()
        {
            return;
        }
        self.open_sink(&path, generation);
    }

    fn open_sink(&mut self, path: &Path, generation: u64) {
        match self.sink.open(path) {
            Ok(outcome) => {
                if let Err(err) = self.pipeline.state.mark_file_open() {
                    tracing::error!(target: INTERNAL_TARGET, error = %err, "opened log file rejected");
                    self.sink.close().ok();
                    return;
                }
                self.opened_generation = Some(generation);
                tracing::debug!(target: INTERNAL_TARGET, path = %path.display(), ?outcome, "log file open");
                let line = match outcome {
                    OpenOutcome::Created => "Log created.",
                    OpenOutcome::Reopened => "Log reopened.",
                };
                self.pipeline.log(Severity::Debug, line.to_string());
            }
            Err(err) => {
                tracing::error!(
                    target: INTERNAL_TARGET,
                    error = %err,
                    "log file unavailable, continuing console-only"
                );
                self.pipeline.state.mark_file_unavailable();
            }
        }
    }

    fn close_sink(&mut self) {
        if let Err(err) = self.sink.close() {
            tracing::warn!(target: INTERNAL_TARGET, error = %err, "closing log file failed");
        }
        self.pipeline.state.mark_file_closed();
        self.opened_generation = None;
    }

    fn write_failed(&mut self, err: &SinkError) {
        tracing::error!(
            target: INTERNAL_TARGET,
            error = %err,
            "log file write failed, continuing console-only"
        );
        self.pipeline.state.mark_file_unavailable();
        self.close_sink();
    }

    /// Move every queued record to disk, or discard it when no file is
    /// open. Returns whether anything was drained.
    fn drain_batch(&mut self) -> bool {
        let records = self.pipeline.queue.drain_all();
        if records.is_empty() && self.pipeline.buffer.is_empty() {
            return false;
        }
        for record in &records {
            self.pipeline.buffer.append(record.to_line().as_bytes());
        }
        let bytes = self.pipeline.buffer.drain_all();
        if !self.sink.is_open() || bytes.is_empty() {
            return true;
        }
        let result = {
            let _access = self.pipeline.state.begin_file_access();
            self.sink.write(&bytes)
        };
        if let Err(err) = result {
            self.write_failed(&err);
        }
        true
    }

    /// Finish shutdown once nothing is left to write.
    fn try_finish(&mut self) -> bool {
        let state = &self.pipeline.state;
        if !state.is_disposing() || state.is_accessing_file() || !self.pipeline.buffer.is_empty() {
            return false;
        }
        if !self.pipeline.queue.seal_if_empty() {
            return false;
        }
        self.pipeline.deliver_deferred();
        self.close_sink();
        if let Err(err) = self.pipeline.state.mark_disposed() {
            tracing::error!(target: INTERNAL_TARGET, error = %err, "final transition failed");
        }
        true
    }
}
