//! Tracing subscriber installation

use cv_shared::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

use crate::InfrastructureError;

/// Build the filter: `RUST_LOG` wins over the configured level
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, InfrastructureError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            InfrastructureError::Config(format!("Invalid log level '{}': {}", config.level, e))
        }),
    }
}

/// Install the global tracing subscriber
///
/// Fails if the level directive is invalid or a subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), InfrastructureError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_filter(config)?)
        .with_ansi(config.colored)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_target(true);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };

    installed.map_err(|e| {
        InfrastructureError::Config(format!("Failed to install tracing subscriber: {}", e))
    })
}
