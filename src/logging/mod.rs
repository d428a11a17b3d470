//! Логирование на `tracing`: консоль (stderr) и необязательный файл с
//! ежедневной ротацией.

pub mod config;
mod filters;
mod formatter;
pub mod handle;
pub mod sinks;

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::{LogFormat, LoggingConfig};
pub use handle::LoggingHandle;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),
    #[error("Invalid logging config: {0}")]
    InvalidConfig(String),
    #[error("Failed to prepare log directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Global subscriber already set: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Устанавливает глобальный subscriber. Вызывается один раз на процесс.
pub fn init_logging(mut config: LoggingConfig) -> Result<LoggingHandle, LoggingError> {
    config.apply_env_overrides();
    config.validate()?;

    let env_filter = filters::build_filter_from_config(&config);
    let mut layers = Vec::new();

    if config.console_enabled {
        layers.push(sinks::console::layer(&config));
    }

    let file_guard = match &config.log_dir {
        Some(dir) => {
            let (layer, guard) = sinks::file::layer(&config, dir)?;
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        format = %config.format,
        file = config.log_dir.is_some(),
        "Logging initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
