//! The runtime booted by the injected library.
//!
//! `init()` loads configuration, brings up logging and installs the crash
//! reporter. The scripting and hooking layers plug in on top of this and are
//! not part of this crate.
//!
//! `static_cleanup()` may run before a slow `init()` reaches the crash
//! reporter. Each runtime remembers the cleanup epoch it was created in, and
//! `init()` only installs the guard, under the `CRASH_GUARD` lock, if no
//! cleanup has happened since. A late init therefore never hooks signals
//! after the module was unloaded.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use hookrt_config::logging::try_init_logging;
use hookrt_config::{log_runtime_debug, log_runtime_info, Config};
use hookrt_crash::SignalGuard;

use crate::runtime::{ErrorObject, Runtime, RuntimeConfig};
use crate::{LoaderError, Result};

/// The crash guard installed by `init()`, torn down by `static_cleanup()`.
static CRASH_GUARD: Mutex<Option<SignalGuard>> = Mutex::new(None);

/// Bumped by every `static_cleanup()`, always under the `CRASH_GUARD` lock.
static CLEANUP_EPOCH: AtomicU64 = AtomicU64::new(0);

pub struct HostRuntime {
    module_path: PathBuf,
    config: RuntimeConfig,
    error: ErrorObject,
    epoch: u64,
}

impl HostRuntime {
    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    fn settings(&self) -> Result<Config> {
        if let Some(settings) = &self.config.settings {
            return Ok(settings.clone());
        }
        let module_dir = self
            .module_path
            .parent()
            .ok_or_else(|| LoaderError::NoModuleDir(self.module_path.clone()))?;
        hookrt_config::reload_for_module(module_dir)?;
        Ok(hookrt_config::config().clone())
    }

    /// Enable the process-wide guard unless the module was cleaned up after
    /// this runtime was created. Returns whether a guard was installed.
    fn install_crash_guard(&self, full_memory_dump: bool) -> Result<bool> {
        let mut slot = CRASH_GUARD.lock().unwrap_or_else(PoisonError::into_inner);
        if CLEANUP_EPOCH.load(Ordering::SeqCst) != self.epoch {
            log_runtime_debug!("Module already unloaded, crash reporter not installed");
            return Ok(false);
        }

        let mut guard = SignalGuard::new();
        guard.enable()?;
        // Only the installed guard decides the dump verbosity.
        guard.set_full_memory_dump(full_memory_dump);
        *slot = Some(guard);
        Ok(true)
    }

    fn try_init(&self) -> Result<()> {
        let settings = self.settings()?;

        // The host may already own a global subscriber; ours is optional.
        if try_init_logging(settings.logging.level).is_err() {
            log_runtime_debug!("Global subscriber already installed");
        }

        let installed = if settings.crash.enabled {
            self.install_crash_guard(settings.crash.full_memory_dump)?
        } else {
            false
        };

        log_runtime_info!(
            "Runtime initialized",
            module = tracing::field::display(self.module_path.display()),
            crash_reporter = installed,
            full_memory_dump = settings.crash.full_memory_dump
        );
        Ok(())
    }
}

impl Runtime for HostRuntime {
    fn new(module_path: PathBuf, config: RuntimeConfig) -> Self {
        Self {
            module_path,
            config,
            error: ErrorObject::new(),
            epoch: CLEANUP_EPOCH.load(Ordering::SeqCst),
        }
    }

    fn init(&self) {
        if let Err(e) = self.try_init() {
            self.error.set(e.to_string());
        }
    }

    fn error_object(&self) -> &ErrorObject {
        &self.error
    }

    fn static_cleanup() {
        let mut slot = CRASH_GUARD.lock().unwrap_or_else(PoisonError::into_inner);
        CLEANUP_EPOCH.fetch_add(1, Ordering::SeqCst);
        if let Some(mut guard) = slot.take() {
            guard.disable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ModuleLifecycle;
    use crate::output::TracingOutput;
    use crate::spawner::{Spawner, Task};
    use crate::state::ModuleState;
    use hookrt_config::testing::TestEnvironment;
    use hookrt_config::CrashConfig;
    use std::io;
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    // CRASH_GUARD is process-wide.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn crash_guard_installed() -> bool {
        CRASH_GUARD
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(SignalGuard::is_enabled)
    }

    fn segv_handler() -> libc::sighandler_t {
        unsafe {
            let mut old: libc::sigaction = std::mem::zeroed();
            libc::sigaction(libc::SIGSEGV, std::ptr::null(), &mut old);
            old.sa_sigaction
        }
    }

    /// Starts each task only after `delay`, and reports when it finished.
    struct DelayedSpawner {
        delay: Duration,
        done: mpsc::Sender<()>,
    }

    impl Spawner for DelayedSpawner {
        fn spawn(&self, task: Task) -> io::Result<()> {
            let delay = self.delay;
            let done = self.done.clone();
            std::thread::Builder::new()
                .name("hookrt-delayed".into())
                .spawn(move || {
                    std::thread::sleep(delay);
                    task();
                    let _ = done.send(());
                })
                .map(drop)
        }
    }

    fn with_settings(crash: CrashConfig) -> RuntimeConfig {
        RuntimeConfig {
            settings: Some(Config {
                crash,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_init_without_crash_reporter() {
        let _lock = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        let runtime = HostRuntime::new(
            PathBuf::from("/opt/game/libhookrt.so"),
            with_settings(CrashConfig {
                enabled: false,
                full_memory_dump: false,
            }),
        );
        runtime.init();
        assert!(!runtime.error_object().has_error());
        assert!(!crash_guard_installed());
    }

    #[test]
    fn test_init_installs_guard_and_cleanup_removes_it() {
        let _lock = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        let runtime = HostRuntime::new(
            PathBuf::from("/opt/game/libhookrt.so"),
            with_settings(CrashConfig {
                enabled: true,
                full_memory_dump: true,
            }),
        );
        runtime.init();
        assert!(!runtime.error_object().has_error(), "{:?}", runtime.error_object().message());
        assert!(crash_guard_installed());
        assert!(hookrt_crash::report::full_memory_dump());

        HostRuntime::static_cleanup();
        assert!(!crash_guard_installed());
        hookrt_crash::SignalGuard::new().set_full_memory_dump(false);
    }

    #[test]
    fn test_second_init_reports_already_enabled() {
        let _lock = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        let first = HostRuntime::new(
            PathBuf::from("/a/lib.so"),
            with_settings(CrashConfig::default()),
        );
        let second = HostRuntime::new(
            PathBuf::from("/b/lib.so"),
            with_settings(CrashConfig {
                enabled: true,
                full_memory_dump: true,
            }),
        );

        first.init();
        second.init();
        assert!(!first.error_object().has_error());
        let message = second.error_object().message().unwrap();
        assert!(message.contains("already enabled"), "{message}");

        // The rejected runtime left the first one's dump setting alone
        assert!(!hookrt_crash::report::full_memory_dump());

        HostRuntime::static_cleanup();
    }

    #[test]
    fn test_malformed_module_config_is_reported() {
        let _lock = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        let env = TestEnvironment::new().unwrap();
        env.write_module_config("[crash\n").unwrap();

        let runtime = HostRuntime::new(env.module_dir.join("libhookrt.so"), RuntimeConfig::default());
        runtime.init();

        let message = runtime.error_object().message().unwrap();
        assert!(message.contains("hookrt.toml"), "{message}");
        assert!(!crash_guard_installed());
    }

    #[test]
    fn test_cleanup_without_init_is_noop() {
        let _lock = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        HostRuntime::static_cleanup();
        assert!(!crash_guard_installed());
    }

    #[test]
    fn test_unload_before_init_leaves_handlers_alone() {
        let _lock = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        let env = TestEnvironment::new().unwrap();
        env.write_module_config("[crash]\nenabled = true\n").unwrap();
        let before = segv_handler();

        let (done_tx, done_rx) = mpsc::channel();
        let spawner = DelayedSpawner {
            delay: Duration::from_millis(200),
            done: done_tx,
        };
        let mut lifecycle = ModuleLifecycle::<HostRuntime>::load(
            env.module_dir.join("libhookrt.so"),
            &spawner,
            Arc::new(TracingOutput::new()),
        );
        lifecycle.unload();
        assert_eq!(lifecycle.state(), ModuleState::Terminated);

        // Let the late init run to completion
        done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(segv_handler(), before, "SIGSEGV still hooked after unload");
        assert!(!crash_guard_installed());
        assert_eq!(lifecycle.state(), ModuleState::Terminated);

        // A runtime created after the cleanup installs normally
        let next = HostRuntime::new(
            env.module_dir.join("libhookrt.so"),
            with_settings(CrashConfig::default()),
        );
        next.init();
        assert!(!next.error_object().has_error(), "{:?}", next.error_object().message());
        assert!(crash_guard_installed());
        HostRuntime::static_cleanup();
        assert_eq!(segv_handler(), before);
    }
}
