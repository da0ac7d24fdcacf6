//! [`tracing_subscriber`] setup.

use std::{fmt, sync::Once};

use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{
        FmtContext,
        format::{FormatEvent, FormatFields, Writer},
        time::{FormatTime, SystemTime},
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::{FileLogConfig, LogConfig, LogFormat, LogRotation, StdoutLogConfig};

/// Logfmt event formatter: `time="..." level=INFO target=... msg fields...`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogfmtFormatter;

impl<S, N> FormatEvent<S, N> for LogfmtFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        write!(writer, "time=\"")?;
        SystemTime.format_time(&mut writer)?;
        write!(writer, "\" level={} target={} ", meta.level(), meta.target())?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

impl LogConfig {
    /// Installs the global tracing subscriber.
    ///
    /// `RUST_LOG` directives are honoured on top of the configured level. Fails if a
    /// global subscriber is already set.
    pub fn init_tracing_subscriber(&self) -> eyre::Result<()> {
        let filter =
            EnvFilter::builder().with_default_directive(self.global_level.into()).from_env_lossy();

        let stdout_layer = self.stdout_logs.as_ref().map(stdout_layer);
        let file_layer =
            self.file_logs.as_ref().map(|config| file_layer(config, &self.file_prefix));

        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| eyre::eyre!("failed to initialize tracing subscriber: {e}"))
    }
}

fn stdout_layer<S>(config: &StdoutLogConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
{
    let base = tracing_subscriber::fmt::layer().with_timer(SystemTime);

    match config.format {
        LogFormat::Full => base.boxed(),
        LogFormat::Json => base.json().boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Logfmt => base.event_format(LogfmtFormatter).boxed(),
    }
}

fn file_layer<S>(config: &FileLogConfig, prefix: &str) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
{
    let rotation = match config.rotation {
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    };
    let appender = RollingFileAppender::new(rotation, &config.directory_path, prefix);

    let base = tracing_subscriber::fmt::layer().with_writer(appender).with_ansi(false);

    match config.format {
        LogFormat::Full => base.boxed(),
        LogFormat::Json => base.json().boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Logfmt => base.event_format(LogfmtFormatter).boxed(),
    }
}

/// Installs a test-writer subscriber once per process.
///
/// Safe to call from every test.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(tracing::level_filters::LevelFilter::DEBUG.into())
            .from_env_lossy();

        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}
