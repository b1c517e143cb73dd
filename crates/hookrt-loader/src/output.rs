//! Where initialization errors are reported.
//!
//! The primary channel is structured logging. When the channel reports that
//! it is itself broken, errors go unformatted to stdout instead.

use hookrt_config::LogLevel;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Level-tagged output with a self-health check.
pub trait OutputChannel: Send + Sync + 'static {
    fn send(&self, level: LogLevel, message: &str);

    /// True when the channel cannot deliver messages.
    fn has_internal_error(&self) -> bool;
}

/// [`OutputChannel`] backed by the global `tracing` dispatcher.
///
/// The channel counts as broken until some subscriber is installed, or after
/// [`TracingOutput::mark_internal_error`].
#[derive(Debug, Default)]
pub struct TracingOutput {
    internal_error: AtomicBool,
}

impl TracingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_internal_error(&self) {
        self.internal_error.store(true, Ordering::Relaxed);
    }
}

impl OutputChannel for TracingOutput {
    fn send(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => tracing::error!(component = "RUNTIME", "{message}"),
            LogLevel::Warn => tracing::warn!(component = "RUNTIME", "{message}"),
            LogLevel::Info => tracing::info!(component = "RUNTIME", "{message}"),
            LogLevel::Debug => tracing::debug!(component = "RUNTIME", "{message}"),
            LogLevel::Trace => tracing::trace!(component = "RUNTIME", "{message}"),
        }
    }

    fn has_internal_error(&self) -> bool {
        self.internal_error.load(Ordering::Relaxed) || !tracing::dispatcher::has_been_set()
    }
}

/// Report a failed `init()`: through `output` when it is healthy, otherwise
/// as a raw `Error: <message>` line on `fallback`.
pub fn report_init_error<O, W>(output: &O, message: &str, fallback: &mut W)
where
    O: OutputChannel + ?Sized,
    W: Write,
{
    if !output.has_internal_error() {
        output.send(LogLevel::Error, &format!("Fatal Error: {message}"));
    } else {
        let _ = writeln!(fallback, "Error: {message}");
        let _ = fallback.flush();
    }
}
