//! Command: panic on purpose so the failure hooks have something to report.
use std::sync::Arc;

use anyhow::{Context as _, Result};
use faultlog::{LogService, spawn_reported};

use crate::cli::{CrashOpts, CrashSite};

/// Fallback message logged when the guarded crash fires.
const GUARDED_FALLBACK: &str = "Guarded action failed";

/// Panic at the requested site and return the resulting exit code.
///
/// A `main` crash does not return: the panic unwinds to `main`, after the
/// hook has reported it as terminating.
///
/// # Errors
///
/// Returns an error if the worker thread cannot be spawned.
#[allow(clippy::panic)]
pub fn run(service: &Arc<LogService>, opts: &CrashOpts) -> Result<i32> {
    let message = opts.message.clone();
    match opts.site {
        CrashSite::Worker => {
            let handle = spawn_reported(service, "crash-worker", move || crash(&message))
                .context("spawning crash worker")?;
            let survived = handle.join().ok().flatten().is_some();
            tracing::info!("worker thread finished, survived: {survived}");
            Ok(i32::from(!survived))
        }
        CrashSite::Main => {
            crash(&message);
            Ok(0)
        }
        CrashSite::Guarded => Ok(service.run_guarded(GUARDED_FALLBACK, || -> Result<()> {
            panic!("{message}")
        })),
    }
}

#[allow(clippy::panic)]
fn crash(message: &str) {
    panic!("{message}")
}
