//! # hookrt-crash
//!
//! Fatal-signal crash diagnostics for a module injected into a host process.
//!
//! - [`SignalGuard`] hooks SIGSEGV, SIGABRT, SIGFPE, SIGILL, SIGBUS and SIGTRAP,
//!   remembering whatever handler was installed before so it can be put back.
//! - The crash reporter (see [`report`]) runs on the faulting thread, writes
//!   `crash_<YYYY>_<MM>_<DD>_<HH>_<mm>_<SS>.log` into the working directory,
//!   then re-raises the signal with the default disposition.
//!
//! # Signal context
//!
//! The reporter formats strings and does buffered file I/O from inside the
//! handler. That is not async-signal-safe; on a badly corrupted process the
//! handler itself may hang or fail and no log is produced. Logging through
//! `tracing` is never done from the handler, only raw `write(2)`.

pub mod backtrace;
pub mod guard;
pub mod report;
pub mod signals;

pub use guard::SignalGuard;
pub use report::{crash_log_file_name, write_report, CrashRecord};
pub use signals::MonitoredSignal;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrashError {
    #[error("fatal-signal guard already enabled in this process")]
    AlreadyEnabled,

    #[error("failed to install handler for {signal}: {source}")]
    Install {
        signal: MonitoredSignal,
        #[source]
        source: nix::Error,
    },
}

pub type Result<T> = std::result::Result<T, CrashError>;
