use std::io;

use crate::logging::{
    config::LoggingConfig,
    formatter::{build_layer, BoxedLayer},
};

/// Слой вывода в stderr; stdout остаётся за результатами команд.
pub fn layer(config: &LoggingConfig) -> BoxedLayer {
    build_layer(
        config.format,
        config.with_ansi,
        config.with_target,
        io::stderr,
    )
}
