//! # hookrt-loader
//!
//! Bridges a host process's module load/unload events to the injected
//! runtime's own initialization and shutdown.
//!
//! - On load: resolve our own on-disk path, construct the runtime, and hand
//!   it to a detached thread for `init()`. The loader thread never waits.
//! - On unload: run the runtime's static cleanup.
//!
//! # Unload vs. initialization
//!
//! The unload hook and the init thread are not synchronized. Cleanup may run
//! while `init()` is still executing. The runtime is shared through an `Arc`,
//! so unload only drops its own handle and the object stays alive until the
//! init thread is done with it. [`ModuleState`] is atomic so a late-finishing
//! init never moves an unloaded module back to `Running`.
//!
//! Keeping the object alive is not enough for process-wide side effects.
//! [`HostRuntime`] records the cleanup epoch it was created in; cleanup bumps
//! the epoch under the same lock that guards the crash-reporter slot, and a
//! late `init()` that sees a newer epoch skips installing signal handlers.

pub mod host;
pub mod lifecycle;
pub mod module_path;
pub mod output;
pub mod runtime;
pub mod spawner;
pub mod state;

pub use host::HostRuntime;
pub use lifecycle::{ModuleLifecycle, ModuleSlot};
pub use output::{report_init_error, OutputChannel, TracingOutput};
pub use runtime::{ErrorObject, Runtime, RuntimeConfig};
pub use spawner::{DetachedSpawner, Spawner, Task};
pub use state::ModuleState;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("configuration error: {0}")]
    Config(#[from] hookrt_config::ConfigError),

    #[error("crash reporter error: {0}")]
    Crash(#[from] hookrt_crash::CrashError),

    #[error("module path has no parent directory: {0}")]
    NoModuleDir(std::path::PathBuf),
}

pub type Result<T> = std::result::Result<T, LoaderError>;
