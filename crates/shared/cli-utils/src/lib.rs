#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod args;
pub use args::LogArgs;

mod logs;
pub use logs::{
    FileLogConfig, LogConfig, LogFormat, LogRotation, StdoutLogConfig, verbosity_to_level_filter,
};

mod subscriber;
pub use subscriber::{LogfmtFormatter, init_test_tracing};

mod prometheus;
pub use prometheus::{BuildError, MetricsConfig};

mod runtime;
pub use runtime::RuntimeManager;
