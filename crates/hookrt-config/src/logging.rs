//! Structured logging utilities for hookrt components.
//!
//! Provides consistent logging with component prefixes and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use hookrt_config::logging::*;
//!
//! log_loader_info!("Module loaded", path = tracing::field::display(module_path.display()));
//! log_crash_debug!("Handler hooked", signal = "SIGSEGV");
//! ```
//!
//! None of these macros may be used from inside a signal handler.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const CRASH: &'static str = "CRASH";
    pub const LOADER: &'static str = "LOADER";
    pub const RUNTIME: &'static str = "RUNTIME";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
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

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

// === CRASH logging macros ===

#[macro_export]
macro_rules! log_crash_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "CRASH", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_crash_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "CRASH", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_crash_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "CRASH", $($key = $value,)* $msg)
    };
}

// === LOADER logging macros ===

#[macro_export]
macro_rules! log_loader_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "LOADER", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_loader_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "LOADER", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_loader_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "LOADER", $($key = $value,)* $msg)
    };
}

// === RUNTIME logging macros ===

#[macro_export]
macro_rules! log_runtime_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "RUNTIME", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_runtime_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "RUNTIME", $($key = $value,)* $msg)
    };
}

fn env_filter(level: LogLevel) -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;

    EnvFilter::try_from_env("HOOKRT_LOG").unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Initialize logging with the given level filter.
/// Call this once at application startup.
pub fn init_logging(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Like [`init_logging`], but reports failure instead of panicking when a
/// global subscriber is already installed (the host may own one).
pub fn try_init_logging(level: LogLevel) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish()
        .try_init()
}
