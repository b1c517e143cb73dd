//! Installation and restoration of the fatal-signal handlers.

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet};
use std::sync::atomic::{AtomicBool, Ordering};

use hookrt_config::{log_crash_debug, log_crash_info, log_crash_warn};

use crate::report;
use crate::signals::MonitoredSignal;
use crate::{CrashError, Result};

/// Set while some guard has its handlers installed. Only one guard per
/// process may hold the installation; a second `enable()` would otherwise
/// record our own trampoline as the "previous" handler.
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Previous disposition per monitored signal, indexed by [`MonitoredSignal::slot`].
type HandlerTable = [Option<SigAction>; MonitoredSignal::COUNT];

/// OS-facing handler. Holds no state; everything happens in the reporter.
extern "C" fn crash_trampoline(signum: libc::c_int) {
    report::handle_fatal_signal(signum);
}

/// Owns the fatal-signal hooks for the process.
///
/// `enable()` records the handler that was active before for each monitored
/// signal; `disable()` (or drop) puts exactly those back.
pub struct SignalGuard {
    previous: HandlerTable,
    enabled: bool,
}

impl SignalGuard {
    pub fn new() -> Self {
        Self {
            previous: Default::default(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Hook every monitored signal.
    ///
    /// Fails with [`CrashError::AlreadyEnabled`] if this guard, or any other
    /// guard in the process, is already enabled. If the OS refuses one of
    /// the hooks, the signals hooked so far are restored before returning.
    pub fn enable(&mut self) -> Result<()> {
        if self.enabled
            || INSTALLED
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            return Err(CrashError::AlreadyEnabled);
        }

        let action = SigAction::new(
            SigHandler::Handler(crash_trampoline),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );

        for sig in MonitoredSignal::ALL {
            match unsafe { sigaction(sig.signal(), &action) } {
                Ok(previous) => {
                    self.previous[sig.slot()] = Some(previous);
                    log_crash_debug!("Hooked fatal signal", signal = sig.name());
                }
                Err(source) => {
                    self.restore_all();
                    INSTALLED.store(false, Ordering::SeqCst);
                    return Err(CrashError::Install {
                        signal: sig,
                        source,
                    });
                }
            }
        }

        self.enabled = true;
        log_crash_info!("Crash reporter enabled", signals = MonitoredSignal::COUNT);
        Ok(())
    }

    /// Restore the handlers recorded by `enable()`. No-op when not enabled.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.restore_all();
        self.enabled = false;
        INSTALLED.store(false, Ordering::SeqCst);
        log_crash_info!("Crash reporter disabled");
    }

    /// Dump verbosity for every future crash in this process.
    pub fn set_full_memory_dump(&self, enabled: bool) {
        report::set_full_memory_dump(enabled);
    }

    fn restore_all(&mut self) {
        for sig in MonitoredSignal::ALL {
            let Some(previous) = self.previous[sig.slot()].take() else {
                continue;
            };
            if let Err(e) = unsafe { sigaction(sig.signal(), &previous) } {
                log_crash_warn!(
                    "Failed to restore previous handler",
                    signal = sig.name(),
                    error = tracing::field::display(e)
                );
            }
        }
    }
}

impl Default for SignalGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.disable();
    }
}
