//! Structured Logger
//!
//! Console output for humans, daily-rotated NDJSON for machines. `RUST_LOG`
//! overrides the configured level.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Where console output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogTarget {
    #[default]
    Stdout,
    /// Interactive commands print answers on stdout; keep logs out of the way.
    Stderr,
}

/// Initialize the global logger. A second call is a no-op.
///
/// With `log_dir` set, NDJSON also goes to `<log_dir>/assetlens.log.YYYY-MM-DD`.
pub fn init_logger(log_dir: Option<&Path>, level: &str, target: LogTarget) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = log_dir.map(|dir| {
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, "assetlens.log");
        fmt::layer().json().with_writer(appender).with_ansi(false)
    });

    let console_layer = match target {
        LogTarget::Stdout => fmt::layer().with_writer(std::io::stdout).with_target(false).boxed(),
        LogTarget::Stderr => fmt::layer().with_writer(std::io::stderr).with_target(false).boxed(),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
