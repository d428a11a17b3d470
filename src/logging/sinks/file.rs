use std::{fs, io, path::Path};

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling::daily};

use crate::logging::{
    config::LoggingConfig,
    formatter::{build_layer, BoxedLayer},
};

/// Файловый слой с ежедневной ротацией. Guard необходимо держать живым,
/// пока нужен вывод.
pub fn layer(
    config: &LoggingConfig,
    dir: &Path,
) -> io::Result<(BoxedLayer, WorkerGuard)> {
    fs::create_dir_all(dir)?;

    let appender = daily(dir, &config.file_name);
    let (writer, guard) = non_blocking(appender);

    Ok((
        build_layer(config.format, false, config.with_target, writer),
        guard,
    ))
}
