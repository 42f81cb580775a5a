//! Logging for the network map service.
//!
//! A trimmed-down version of the teacher's syslog-capable logger: we only
//! ever need to emit to stdout/stderr here, so there is no syslog layer,
//! file layer, or hot-reload handle — just a `tracing_subscriber`
//! `EnvFilter` built once at startup.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// The severity threshold for log output.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init(level: LogLevel) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
