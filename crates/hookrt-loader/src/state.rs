use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of the injected runtime.
///
/// `Unloaded → Initializing → Running | Failed → Unloading → Terminated`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModuleState {
    Unloaded = 0,
    Initializing = 1,
    Running = 2,
    /// `init()` returned with an error; the host keeps running.
    Failed = 3,
    Unloading = 4,
    Terminated = 5,
}

impl ModuleState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ModuleState::Initializing,
            2 => ModuleState::Running,
            3 => ModuleState::Failed,
            4 => ModuleState::Unloading,
            5 => ModuleState::Terminated,
            _ => ModuleState::Unloaded,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleState::Unloaded => "Unloaded",
            ModuleState::Initializing => "Initializing",
            ModuleState::Running => "Running",
            ModuleState::Failed => "Failed",
            ModuleState::Unloading => "Unloading",
            ModuleState::Terminated => "Terminated",
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared between the loader thread and the init thread.
#[derive(Debug)]
pub(crate) struct AtomicModuleState(AtomicU8);

impl AtomicModuleState {
    pub(crate) const fn new(state: ModuleState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> ModuleState {
        ModuleState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ModuleState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move `from → to` only if the current state is still `from`.
    pub(crate) fn transition(&self, from: ModuleState, to: ModuleState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
