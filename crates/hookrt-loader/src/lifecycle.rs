// =============================================================================
// lifecycle.rs: Load / background init / unload of the injected runtime
// =============================================================================
//
//   - ModuleLifecycle::load()  : loader thread: construct, spawn, return
//   - run_initialization()     : init thread: init(), report errors, exit
//   - ModuleLifecycle::unload(): loader thread: static cleanup
//   - ModuleSlot               : process-wide home for the lifecycle, used
//                                by the library's load/unload hooks
//
// Unload does not wait for the init thread. Both hold an Arc to the runtime;
// the last one to let go destroys it.
// =============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use hookrt_config::{log_loader_debug, log_loader_error, log_loader_info};

use crate::output::{report_init_error, OutputChannel};
use crate::runtime::{Runtime, RuntimeConfig};
use crate::spawner::Spawner;
use crate::state::{AtomicModuleState, ModuleState};

pub struct ModuleLifecycle<R: Runtime> {
    state: Arc<AtomicModuleState>,
    runtime: Option<Arc<R>>,
    module_path: PathBuf,
}

impl<R: Runtime> ModuleLifecycle<R> {
    /// Load hook body. Constructs the runtime and starts its initialization
    /// on a task from `spawner`; returns without waiting for it.
    ///
    /// If the task cannot be started the runtime is discarded and the
    /// returned lifecycle is inert (`Unloaded`, no runtime).
    pub fn load<S, O>(module_path: PathBuf, spawner: &S, output: Arc<O>) -> Self
    where
        S: Spawner + ?Sized,
        O: OutputChannel,
    {
        let state = Arc::new(AtomicModuleState::new(ModuleState::Initializing));
        let runtime = Arc::new(R::new(module_path.clone(), RuntimeConfig::default()));

        let task = {
            let runtime = Arc::clone(&runtime);
            let state = Arc::clone(&state);
            Box::new(move || {
                run_initialization(&*runtime, &state, &*output, &mut std::io::stdout());
            })
        };

        match spawner.spawn(task) {
            Ok(()) => {
                log_loader_debug!(
                    "Initialization thread started",
                    module = tracing::field::display(module_path.display())
                );
                Self {
                    state,
                    runtime: Some(runtime),
                    module_path,
                }
            }
            Err(e) => {
                eprintln!("Failed to create initialization thread");
                log_loader_error!(
                    "Failed to create initialization thread",
                    error = tracing::field::display(e)
                );
                drop(runtime);
                state.set(ModuleState::Unloaded);
                Self {
                    state,
                    runtime: None,
                    module_path,
                }
            }
        }
    }

    /// Unload hook body. Runs the runtime's static cleanup if a runtime was
    /// ever handed out; otherwise does nothing.
    pub fn unload(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };

        let was = self.state.get();
        self.state.set(ModuleState::Unloading);
        log_loader_info!("Unloading runtime", previous_state = was.as_str());

        R::static_cleanup();

        // The init thread may still hold its own handle.
        drop(runtime);
        self.state.set(ModuleState::Terminated);
    }

    pub fn state(&self) -> ModuleState {
        self.state.get()
    }

    pub fn runtime(&self) -> Option<&Arc<R>> {
        self.runtime.as_ref()
    }

    pub fn module_path(&self) -> &std::path::Path {
        &self.module_path
    }
}

/// Body of the init thread.
fn run_initialization<R, O, W>(runtime: &R, state: &AtomicModuleState, output: &O, fallback: &mut W)
where
    R: Runtime,
    O: OutputChannel + ?Sized,
    W: Write,
{
    runtime.init();

    let error = runtime.error_object();
    let outcome = match error.message() {
        Some(message) => {
            report_init_error(output, &message, fallback);
            ModuleState::Failed
        }
        None => ModuleState::Running,
    };

    // Loses against a concurrent unload, which is fine.
    if !state.transition(ModuleState::Initializing, outcome) {
        log_loader_debug!(
            "Initialization finished after unload",
            state = state.get().as_str()
        );
    }
}

/// Process-wide home of one module's lifecycle, for `static` use by the
/// library's load and unload hooks.
pub struct ModuleSlot<R: Runtime> {
    inner: Mutex<Option<ModuleLifecycle<R>>>,
}

impl<R: Runtime> ModuleSlot<R> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Run the load hook unless a lifecycle is already present.
    pub fn load<S, O>(&self, module_path: PathBuf, spawner: &S, output: Arc<O>)
    where
        S: Spawner + ?Sized,
        O: OutputChannel,
    {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }
        *slot = Some(ModuleLifecycle::load(module_path, spawner, output));
    }

    /// Run the unload hook on the stored lifecycle, if any.
    pub fn unload(&self) {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lifecycle) = slot.as_mut() {
            lifecycle.unload();
        }
    }

    pub fn state(&self) -> ModuleState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(ModuleState::Unloaded, ModuleLifecycle::state)
    }
}

impl<R: Runtime> Default for ModuleSlot<R> {
    fn default() -> Self {
        Self::new()
    }
}
