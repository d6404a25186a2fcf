//! Process-wide logging setup.

use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggerConfig};
use crate::error::ConfigError;

/// Installs the global subscriber and routes `log` records into it.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a
/// global logger is already installed.
pub fn init_logging(config: &LoggerConfig) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ConfigError::Logging(format!("invalid level '{}': {}", config.level, e)))?,
    };

    LogTracer::init().map_err(|e| ConfigError::Logging(e.to_string()))?;

    let registry = Registry::default().with(filter);
    let installed = match config.format {
        LogFormat::Console => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().with_target(true)))
        }
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
    };
    installed.map_err(|e| ConfigError::Logging(e.to_string()))?;

    tracing::debug!(format = ?config.format, level = %config.level, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_fails() {
        let config = LoggerConfig::default();
        init_logging(&config).unwrap();

        let err = init_logging(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Logging(_)));
    }
}
