//! Integration tests for the load / init / unload lifecycle.
//!
//! Each test uses its own runtime type so the per-type statics (cleanup
//! counters, gates) never leak between tests running in parallel.

use hookrt_config::LogLevel;
use hookrt_loader::{
    DetachedSpawner, ErrorObject, ModuleLifecycle, ModuleSlot, ModuleState, OutputChannel,
    Runtime, RuntimeConfig, Spawner, Task,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct RecordingOutput {
    broken: bool,
    sent: Mutex<Vec<(LogLevel, String)>>,
}

impl OutputChannel for RecordingOutput {
    fn send(&self, level: LogLevel, message: &str) {
        self.sent.lock().unwrap().push((level, message.to_string()));
    }

    fn has_internal_error(&self) -> bool {
        self.broken
    }
}

fn wait_for<R: Runtime>(lifecycle: &ModuleLifecycle<R>, want: ModuleState) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if lifecycle.state() == want {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn module_path() -> PathBuf {
    PathBuf::from("/opt/host/Binaries/libhookrt.so")
}

/// Defines a runtime type whose `init()` runs `$body` and which counts
/// `static_cleanup()` calls.
macro_rules! stub_runtime {
    ($name:ident, $cleanups:ident, |$rt:ident| $body:block) => {
        static $cleanups: AtomicUsize = AtomicUsize::new(0);

        #[allow(dead_code)]
        struct $name {
            module_path: PathBuf,
            error: ErrorObject,
        }

        impl Runtime for $name {
            fn new(module_path: PathBuf, config: RuntimeConfig) -> Self {
                assert!(config.settings.is_none(), "load hook passes an empty config");
                Self {
                    module_path,
                    error: ErrorObject::new(),
                }
            }

            fn init(&self) {
                let $rt = self;
                $body
            }

            fn error_object(&self) -> &ErrorObject {
                &self.error
            }

            fn static_cleanup() {
                $cleanups.fetch_add(1, Ordering::SeqCst);
            }
        }
    };
}

// --- init never returns ---------------------------------------------------

stub_runtime!(BlockingRuntime, BLOCKING_CLEANUPS, |_rt| {
    loop {
        std::thread::park();
    }
});

#[test]
fn test_load_returns_while_init_blocks_forever() {
    let output = Arc::new(RecordingOutput::default());
    let started = Instant::now();
    let mut lifecycle =
        ModuleLifecycle::<BlockingRuntime>::load(module_path(), &DetachedSpawner::default(), output);

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(lifecycle.state(), ModuleState::Initializing);
    assert!(lifecycle.runtime().is_some());
    assert_eq!(lifecycle.module_path(), module_path());

    // Unload does not wait for the stuck thread either
    lifecycle.unload();
    assert_eq!(lifecycle.state(), ModuleState::Terminated);
    assert_eq!(BLOCKING_CLEANUPS.load(Ordering::SeqCst), 1);
}

// --- init succeeds ----------------------------------------------------------

stub_runtime!(HealthyRuntime, HEALTHY_CLEANUPS, |rt| {
    assert!(rt.module_path.is_absolute());
});

#[test]
fn test_successful_init_reaches_running() {
    let output = Arc::new(RecordingOutput::default());
    let mut lifecycle = ModuleLifecycle::<HealthyRuntime>::load(
        module_path(),
        &DetachedSpawner::default(),
        Arc::clone(&output),
    );

    assert!(wait_for(&lifecycle, ModuleState::Running));
    assert!(output.sent.lock().unwrap().is_empty());

    lifecycle.unload();
    assert_eq!(lifecycle.state(), ModuleState::Terminated);
    assert_eq!(HEALTHY_CLEANUPS.load(Ordering::SeqCst), 1);

    // Second unload has nothing left to clean up
    lifecycle.unload();
    assert_eq!(HEALTHY_CLEANUPS.load(Ordering::SeqCst), 1);
}

// --- init fails ---------------------------------------------------------------

stub_runtime!(FailingRuntime, FAILING_CLEANUPS, |rt| {
    rt.error.set("settings file missing");
});

#[test]
fn test_init_error_goes_through_healthy_channel() {
    let output = Arc::new(RecordingOutput::default());
    let lifecycle = ModuleLifecycle::<FailingRuntime>::load(
        module_path(),
        &DetachedSpawner::default(),
        Arc::clone(&output),
    );

    assert!(wait_for(&lifecycle, ModuleState::Failed));
    assert_eq!(
        *output.sent.lock().unwrap(),
        vec![(LogLevel::Error, "Fatal Error: settings file missing".to_string())]
    );
    assert_eq!(FAILING_CLEANUPS.load(Ordering::SeqCst), 0);
}

stub_runtime!(FailingRuntime2, FAILING2_CLEANUPS, |rt| {
    rt.error.set("settings file missing");
});

#[test]
fn test_init_error_skips_broken_channel() {
    let output = Arc::new(RecordingOutput {
        broken: true,
        ..Default::default()
    });
    let lifecycle = ModuleLifecycle::<FailingRuntime2>::load(
        module_path(),
        &DetachedSpawner::default(),
        Arc::clone(&output),
    );

    // The message went to stdout instead
    assert!(wait_for(&lifecycle, ModuleState::Failed));
    assert!(output.sent.lock().unwrap().is_empty());
    assert_eq!(FAILING2_CLEANUPS.load(Ordering::SeqCst), 0);
}

// --- thread creation fails ----------------------------------------------------

struct RefusingSpawner;

impl Spawner for RefusingSpawner {
    fn spawn(&self, _task: Task) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::WouldBlock, "thread limit reached"))
    }
}

static NEVER_INITIALIZED: AtomicBool = AtomicBool::new(true);

stub_runtime!(UnspawnedRuntime, UNSPAWNED_CLEANUPS, |_rt| {
    NEVER_INITIALIZED.store(false, Ordering::SeqCst);
});

#[test]
fn test_spawn_failure_leaves_module_inert() {
    let output = Arc::new(RecordingOutput::default());
    let mut lifecycle =
        ModuleLifecycle::<UnspawnedRuntime>::load(module_path(), &RefusingSpawner, output);

    assert_eq!(lifecycle.state(), ModuleState::Unloaded);
    assert!(lifecycle.runtime().is_none());

    lifecycle.unload();
    assert_eq!(lifecycle.state(), ModuleState::Unloaded);
    assert_eq!(UNSPAWNED_CLEANUPS.load(Ordering::SeqCst), 0);
    assert!(NEVER_INITIALIZED.load(Ordering::SeqCst));
}

// --- unload racing init -------------------------------------------------------

static RACE_COMPLETED_INITS: AtomicUsize = AtomicUsize::new(0);

stub_runtime!(RacingRuntime, RACING_CLEANUPS, |_rt| {
    std::thread::sleep(Duration::from_micros(200));
    RACE_COMPLETED_INITS.fetch_add(1, Ordering::SeqCst);
});

/// Unload may land before, during or after `init()`. Which one happens is
/// nondeterministic; the only guarantees are that nothing crashes, cleanup
/// runs once per load, and the final state is Terminated.
#[test]
fn test_unload_racing_init_is_survivable() {
    const ROUNDS: usize = 50;
    let output = Arc::new(RecordingOutput::default());
    let spawner = DetachedSpawner::new("hookrt-race");

    let mut finished_before_unload = 0;
    for _ in 0..ROUNDS {
        let mut lifecycle =
            ModuleLifecycle::<RacingRuntime>::load(module_path(), &spawner, Arc::clone(&output));
        if lifecycle.state() == ModuleState::Running {
            finished_before_unload += 1;
        }
        lifecycle.unload();
        assert_eq!(lifecycle.state(), ModuleState::Terminated);
    }

    assert_eq!(RACING_CLEANUPS.load(Ordering::SeqCst), ROUNDS);
    assert!(finished_before_unload <= ROUNDS);

    // Stragglers still finish on their own handle of the runtime
    let deadline = Instant::now() + Duration::from_secs(10);
    while RACE_COMPLETED_INITS.load(Ordering::SeqCst) < ROUNDS && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(RACE_COMPLETED_INITS.load(Ordering::SeqCst), ROUNDS);
    assert!(output.sent.lock().unwrap().is_empty());
}

// --- process-wide slot ----------------------------------------------------------

stub_runtime!(SlotRuntime, SLOT_CLEANUPS, |_rt| {});

static SLOT: ModuleSlot<SlotRuntime> = ModuleSlot::new();

#[test]
fn test_module_slot_loads_once() {
    assert_eq!(SLOT.state(), ModuleState::Unloaded);

    let spawner = DetachedSpawner::default();
    SLOT.load(module_path(), &spawner, Arc::new(RecordingOutput::default()));
    SLOT.load(module_path(), &spawner, Arc::new(RecordingOutput::default()));

    let deadline = Instant::now() + Duration::from_secs(10);
    while SLOT.state() != ModuleState::Running && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(SLOT.state(), ModuleState::Running);

    SLOT.unload();
    assert_eq!(SLOT.state(), ModuleState::Terminated);
    assert_eq!(SLOT_CLEANUPS.load(Ordering::SeqCst), 1);
}
