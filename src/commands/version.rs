//! Command: print version information.

/// Version string embedded at build time.
#[must_use]
pub fn version_string() -> String {
    let version = option_env!("FAULTLOG_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    format!("faultlog {version}")
}

/// Print the faultlog version to stdout.
#[allow(clippy::print_stdout)]
pub fn run() {
    println!("{}", version_string());
}
