pub mod crash;
pub mod emit;
pub mod version;

use std::path::Path;
use std::sync::Arc;

use faultlog::config::default_log_dir;
use faultlog::error::{ConfigError, FaultLogError};
use faultlog::{LogConfig, LogService};

use crate::cli::GlobalOpts;

/// Default config file looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "faultlog.toml";

/// Load the config file and apply command-line overrides on top of it.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the config file exists but cannot be read
/// or parsed.
pub fn resolve_config(global: &GlobalOpts) -> Result<LogConfig, ConfigError> {
    let path = global
        .config
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    let mut config = LogConfig::load(path)?;

    if let Some(dir) = &global.log_dir {
        config.directory.clone_from(dir);
    } else if config.directory.as_os_str().is_empty() {
        config.directory = default_log_dir(&config.app_name);
    }
    if let Some(file) = &global.log_file {
        config.alternate_path = Some(file.clone());
    }
    if !global.file_logging {
        config.file_logging = false;
    }
    if global.debug {
        config.include_debug = true;
    }
    Ok(config)
}

/// Resolve the configuration and start a service on it.
///
/// # Errors
///
/// Returns [`FaultLogError::Config`] for a broken config file and
/// [`FaultLogError::Lifecycle`] if the writer thread cannot start.
pub fn start_service(global: &GlobalOpts) -> Result<Arc<LogService>, FaultLogError> {
    let config = resolve_config(global)?;
    let service = Arc::new(LogService::new());
    service.initialize(config)?;
    Ok(service)
}
