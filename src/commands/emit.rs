//! Command: log messages, optionally from several threads at once.
use std::sync::Arc;

use anyhow::{Context as _, Result};
use faultlog::{LogService, Severity, spawn_reported};

use crate::cli::EmitOpts;

/// Log every message `repeat` times from each of `threads` threads.
///
/// With a single thread the messages are logged from the calling thread.
///
/// # Errors
///
/// Returns an error if a worker thread cannot be spawned.
pub fn run(service: &Arc<LogService>, opts: &EmitOpts) -> Result<()> {
    let severity = Severity::from(opts.severity);
    let repeat = opts.repeat;

    if opts.threads <= 1 {
        log_all(service, severity, &opts.messages, repeat);
        tracing::debug!("logged {} records", opts.messages.len() * repeat);
        return Ok(());
    }

    let handles = (0..opts.threads)
        .map(|n| {
            let worker = Arc::clone(service);
            let messages = opts.messages.clone();
            spawn_reported(service, &format!("emit-{n}"), move || {
                log_all(&worker, severity, &messages, repeat);
            })
            .with_context(|| format!("spawning emit thread {n}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let finished = handles
        .into_iter()
        .filter_map(|h| h.join().ok().flatten())
        .count();
    tracing::debug!(
        "{finished} of {} threads logged {} records each",
        opts.threads,
        opts.messages.len() * repeat
    );
    Ok(())
}

fn log_all(service: &LogService, severity: Severity, messages: &[String], repeat: usize) {
    for _ in 0..repeat {
        for message in messages {
            service.log(severity, message.as_str());
        }
    }
}
