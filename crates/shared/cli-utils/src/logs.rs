//! Logging configuration types.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// The format of emitted log lines.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum LogFormat {
    /// Timestamp, level, target, fields.
    #[default]
    Full,
    /// One JSON object per line.
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Level and message only.
    Compact,
    /// `key=value` pairs.
    Logfmt,
}

/// When the log file is rolled over.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate every minute.
    Minutely,
    /// Rotate every hour.
    Hourly,
    /// Rotate every day.
    Daily,
    /// Single growing file.
    #[default]
    Never,
}

/// Configuration for file logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLogConfig {
    /// Directory the log files are written to.
    pub directory_path: PathBuf,
    /// Format of the file logs.
    pub format: LogFormat,
    /// Rotation of the log files.
    pub rotation: LogRotation,
}

/// Configuration for stdout logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdoutLogConfig {
    /// Format of the stdout logs.
    pub format: LogFormat,
}

/// Global logging configuration.
///
/// Defaults to INFO level, full format on stdout and no file output.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Global verbosity level.
    pub global_level: LevelFilter,
    /// Stdout logging, `None` when quiet.
    pub stdout_logs: Option<StdoutLogConfig>,
    /// File logging, `None` when disabled.
    pub file_logs: Option<FileLogConfig>,
    /// File name prefix for the rolling appender.
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global_level: LevelFilter::INFO,
            stdout_logs: Some(StdoutLogConfig { format: LogFormat::Full }),
            file_logs: None,
            file_prefix: "block-filler.log".to_string(),
        }
    }
}

/// Maps a `-v` count to a level filter: 1=ERROR, 2=WARN, 3=INFO, 4=DEBUG, 5+=TRACE.
///
/// Zero disables logging.
pub const fn verbosity_to_level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        4 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::off(0, LevelFilter::OFF)]
    #[case::error(1, LevelFilter::ERROR)]
    #[case::warn(2, LevelFilter::WARN)]
    #[case::info(3, LevelFilter::INFO)]
    #[case::debug(4, LevelFilter::DEBUG)]
    #[case::trace(5, LevelFilter::TRACE)]
    #[case::saturates(42, LevelFilter::TRACE)]
    fn verbosity_mapping(#[case] verbosity: u8, #[case] expected: LevelFilter) {
        assert_eq!(verbosity_to_level_filter(verbosity), expected);
    }

    #[test]
    fn default_config_logs_to_stdout_only() {
        let config = LogConfig::default();
        assert_eq!(config.global_level, LevelFilter::INFO);
        assert_eq!(config.stdout_logs, Some(StdoutLogConfig { format: LogFormat::Full }));
        assert!(config.file_logs.is_none());
    }
}
