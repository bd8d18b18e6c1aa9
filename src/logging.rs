//! Log output for the sorter, built on `tracing`.
//!
//! Nothing is installed globally: [`init`] sets the subscriber for the calling thread and the
//! returned [`LogGuard`] removes it again when dropped.

use std::env;
use std::fmt;
use std::str::FromStr;

use tracing::dispatcher::{self, DefaultGuard};
use tracing::{Dispatch, Level};
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Overrides the configured level with a full filter directive when set.
pub const FILTER_ENV: &str = "RUST_LOG";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Includes the IMAP wire traffic, credentials included.
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!(
                "unknown log level {:?} (expected trace, debug, info, warn or error)",
                other
            )),
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Level {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    /// One JSON object per event instead of human-readable lines.
    pub json: bool,
}

/// Keeps the subscriber installed by [`init`] active until dropped.
#[must_use = "logging stops when the guard is dropped"]
pub struct LogGuard {
    _default: DefaultGuard,
}

impl fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogGuard")
    }
}

fn env_filter(level: LogLevel) -> Result<EnvFilter> {
    match env::var(FILTER_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .map_err(|e| Error::Config(format!("invalid {}: {}", FILTER_ENV, e))),
        _ => Ok(EnvFilter::new(level.as_str())),
    }
}

/// Builds the subscriber described by `config` without installing it.
pub fn dispatch(config: &LogConfig) -> Result<Dispatch> {
    let filter = env_filter(config.level)?;
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_env_filter(filter);
    Ok(if config.json {
        Dispatch::new(builder.json().finish())
    } else {
        Dispatch::new(builder.finish())
    })
}

/// Installs the subscriber for the current thread.
pub fn init(config: &LogConfig) -> Result<LogGuard> {
    let dispatch = dispatch(config)?;
    Ok(LogGuard {
        _default: dispatcher::set_default(&dispatch),
    })
}
