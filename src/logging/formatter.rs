use tracing_subscriber::{
    fmt::{self, MakeWriter},
    Layer, Registry,
};

use crate::logging::config::LogFormat;

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Собирает fmt-слой нужного формата поверх произвольного writer.
pub fn build_layer<W>(
    format: LogFormat,
    with_ansi: bool,
    with_target: bool,
    writer: W,
) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer::<Registry>()
        .with_writer(writer)
        .with_ansi(with_ansi)
        .with_target(with_target);

    match format {
        LogFormat::Json => Box::new(base.json().with_current_span(true)),
        LogFormat::Pretty => Box::new(base.pretty()),
        LogFormat::Compact => Box::new(base.compact()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use tracing_subscriber::prelude::*;

    use super::*;

    /// Буфер в памяти для проверки вывода.
    #[derive(Clone, Default)]
    pub(crate) struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl CaptureWriter {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CaptureWriter {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CaptureWriter {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_json_layer_emits_fields() {
        let capture = CaptureWriter::default();
        let layer = build_layer(LogFormat::Json, false, true, capture.clone());
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(acl = "/tmp/a.acl", "ACL reloaded");
        });

        let out = capture.contents();
        let line = out.lines().next().unwrap();
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(v["fields"]["message"], "ACL reloaded");
        assert_eq!(v["fields"]["acl"], "/tmp/a.acl");
    }

    #[test]
    fn test_compact_and_pretty_layers_write() {
        for format in [LogFormat::Compact, LogFormat::Pretty] {
            let capture = CaptureWriter::default();
            let subscriber = Registry::default().with(build_layer(format, false, false, capture.clone()));
            tracing::subscriber::with_default(subscriber, || {
                tracing::warn!("lock busy");
            });
            assert!(capture.contents().contains("lock busy"), "format {format}");
        }
    }
}
