//! `faultlog` command-line demo: drives a [`faultlog::LogService`] from the
//! shell to exercise file logging and the failure hooks.
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use faultlog::LogService;
use faultlog::logging::init_subscriber;

mod cli;
mod commands;

/// Exit code used when a panic escapes the main thread.
const PANIC_EXIT: u8 = 101;

fn main() -> Result<ExitCode> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();
    init_subscriber(args.verbose);

    if matches!(args.command, cli::Command::Version) {
        commands::version::run();
        return Ok(ExitCode::SUCCESS);
    }

    let service =
        commands::start_service(&args.global).context("starting the logging service")?;
    faultlog::install_panic_hook(&service);

    let on_interrupt = Arc::clone(&service);
    ctrlc::set_handler(move || {
        tracing::warn!("Interrupted, flushing the log");
        if let Err(err) = on_interrupt.begin_shutdown() {
            tracing::error!("{err}");
        }
        std::process::exit(130);
    })
    .context("Error setting Ctrl-C handler")?;

    if let Some(path) = service.current_log_path() {
        tracing::info!("logging to {}", path.display());
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_command(&service, &args.command)));
    if let Ok(Err(err)) = &outcome {
        service.log_error(err);
    }
    service.begin_shutdown().context("flushing the log")?;

    match outcome {
        Ok(result) => result.map(exit_code),
        Err(_) => Ok(ExitCode::from(PANIC_EXIT)),
    }
}

fn run_command(service: &Arc<LogService>, command: &cli::Command) -> Result<i32> {
    match command {
        cli::Command::Emit(opts) => commands::emit::run(service, opts).map(|()| 0),
        cli::Command::Crash(opts) => commands::crash::run(service, opts),
        cli::Command::Version => {
            commands::version::run();
            Ok(0)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}
