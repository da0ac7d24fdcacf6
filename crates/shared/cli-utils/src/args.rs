//! Logging arguments shared by the filler binaries.

use std::path::PathBuf;

use clap::{ArgAction, Args};

use crate::{FileLogConfig, LogConfig, LogFormat, LogRotation, StdoutLogConfig};

/// Logging flags.
///
/// `-v` is counted: one for ERROR up to five for TRACE. Without any `-v` the level is INFO.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
#[command(next_help_heading = "Logging")]
pub struct LogArgs {
    /// Logging verbosity (1=ERROR, 2=WARN, 3=INFO, 4=DEBUG, 5=TRACE).
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        default_value = "3",
        env = "BLOCK_FILLER_LOG_VERBOSITY",
        global = true
    )]
    pub verbosity: u8,

    /// Do not log to stdout.
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    /// Stdout log format.
    #[arg(
        long = "log-format",
        value_enum,
        default_value_t = LogFormat::Full,
        env = "BLOCK_FILLER_LOG_FORMAT",
        global = true
    )]
    pub format: LogFormat,

    /// Also write logs to files in this directory.
    #[arg(long = "log-dir", env = "BLOCK_FILLER_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Format of the log files.
    #[arg(long = "log-file-format", value_enum, default_value_t = LogFormat::Json, global = true)]
    pub file_format: LogFormat,

    /// When log files roll over.
    #[arg(long = "log-rotation", value_enum, default_value_t = LogRotation::Never, global = true)]
    pub rotation: LogRotation,
}

impl Default for LogArgs {
    fn default() -> Self {
        Self {
            verbosity: 3,
            quiet: false,
            format: LogFormat::Full,
            log_dir: None,
            file_format: LogFormat::Json,
            rotation: LogRotation::Never,
        }
    }
}

impl LogArgs {
    /// Logging configuration with log files named after `file_prefix`.
    pub fn to_config(&self, file_prefix: &str) -> LogConfig {
        LogConfig {
            global_level: crate::verbosity_to_level_filter(self.verbosity),
            stdout_logs: (!self.quiet).then_some(StdoutLogConfig { format: self.format }),
            file_logs: self.log_dir.clone().map(|directory_path| FileLogConfig {
                directory_path,
                format: self.file_format,
                rotation: self.rotation,
            }),
            file_prefix: file_prefix.to_string(),
        }
    }

    /// Installs the global subscriber for a binary whose log files start with `file_prefix`.
    pub fn init_tracing(&self, file_prefix: &str) -> eyre::Result<()> {
        self.to_config(file_prefix).init_tracing_subscriber()
    }
}
