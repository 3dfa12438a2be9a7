use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use faultlog::Severity;

/// Top-level CLI entry point for the faultlog demo.
#[derive(Parser, Debug)]
#[command(
    name = "faultlog",
    about = "Exercise the faultlog failure capture and file logging service",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// TOML config file (missing file means defaults)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the log directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Log to an exact file (.log or .txt) instead of the dated file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable writing the log file (console only)
    #[arg(long = "no-file", global = true, action = clap::ArgAction::SetFalse)]
    pub file_logging: bool,

    /// Include debug records in the log
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log messages, optionally from several threads
    Emit(EmitOpts),
    /// Panic on purpose to exercise the failure hooks
    Crash(CrashOpts),
    /// Print version information
    Version,
}

/// Severity accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityArg {
    /// Debug record (needs `--debug`)
    Debug,
    /// Informational record
    Info,
    /// Warning record
    Warning,
    /// Recoverable error
    Error,
    /// Fatal error
    Critical,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Debug => Self::Debug,
            SeverityArg::Info => Self::Info,
            SeverityArg::Warning => Self::Warning,
            SeverityArg::Error => Self::GenericError,
            SeverityArg::Critical => Self::CriticalError,
        }
    }
}

/// Options for the `emit` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct EmitOpts {
    /// Messages to log, in order
    #[arg(required = true)]
    pub messages: Vec<String>,

    /// Severity of every message
    #[arg(short, long, value_enum, default_value_t = SeverityArg::Info)]
    pub severity: SeverityArg,

    /// Number of threads logging the messages concurrently
    #[arg(short, long, default_value_t = 1)]
    pub threads: usize,

    /// How many times each thread logs the message list
    #[arg(short, long, default_value_t = 1)]
    pub repeat: usize,
}

/// Where the `crash` subcommand panics.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashSite {
    /// A worker thread started with `spawn_reported`
    Worker,
    /// The main thread, outside any guard (terminating)
    Main,
    /// Inside `run_guarded`, which turns it into an exit code
    Guarded,
}

/// Options for the `crash` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CrashOpts {
    /// Where to panic
    #[arg(long, value_enum, default_value_t = CrashSite::Worker)]
    pub site: CrashSite,

    /// Panic message
    #[arg(default_value = "simulated crash")]
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing, clippy::unreachable)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_emit_defaults() {
        let cli = Cli::parse_from(["faultlog", "emit", "A", "B"]);
        assert!(cli.global.file_logging);
        assert!(!cli.global.debug);
        let Command::Emit(opts) = cli.command else {
            unreachable!("expected emit");
        };
        assert_eq!(opts.messages, ["A", "B"]);
        assert_eq!(opts.severity, SeverityArg::Info);
        assert_eq!(opts.threads, 1);
    }

    #[test]
    fn parse_emit_threads_and_severity() {
        let cli = Cli::parse_from([
            "faultlog", "emit", "x", "--threads", "10", "--repeat", "10", "-s", "warning",
        ]);
        let Command::Emit(opts) = cli.command else {
            unreachable!("expected emit");
        };
        assert_eq!(opts.threads, 10);
        assert_eq!(opts.repeat, 10);
        assert_eq!(Severity::from(opts.severity), Severity::Warning);
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["faultlog", "emit", "x", "--no-file", "--debug", "-v"]);
        assert!(!cli.global.file_logging);
        assert!(cli.global.debug);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_crash_site() {
        let cli = Cli::parse_from(["faultlog", "crash", "--site", "main", "boom"]);
        let Command::Crash(opts) = cli.command else {
            unreachable!("expected crash");
        };
        assert_eq!(opts.site, CrashSite::Main);
        assert_eq!(opts.message, "boom");
    }

    #[test]
    fn emit_requires_messages() {
        assert!(Cli::try_parse_from(["faultlog", "emit"]).is_err());
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["faultlog", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }
}
