pub mod cameras;
pub mod check;
pub mod serve;

use std::path::PathBuf;

use cameraman_common::config::{LoggingConfig, ServiceConfig};

/// Load configuration and initialize logging from it.
///
/// If loading fails, logging is initialized with defaults and the error is
/// logged before being returned.
pub fn load_config(path: Option<PathBuf>, verbose: bool) -> anyhow::Result<ServiceConfig> {
    let config = match ServiceConfig::load(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            cameraman_common::logging::init_logging(&with_verbosity(
                LoggingConfig::default(),
                verbose,
            ))?;
            tracing::error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    cameraman_common::logging::init_logging(&with_verbosity(config.logging.clone(), verbose))?;
    Ok(config)
}

fn with_verbosity(mut logging: LoggingConfig, verbose: bool) -> LoggingConfig {
    if verbose {
        logging.level = "debug".to_string();
    }
    logging
}
