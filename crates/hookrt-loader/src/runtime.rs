//! Contract between the lifecycle and the runtime it boots.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Initial configuration handed to [`Runtime::new`].
///
/// The load hook always passes the empty default; `settings: None` means
/// "read configuration from disk during `init()`".
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub settings: Option<hookrt_config::Config>,
}

/// Error state a runtime exposes after `init()`.
#[derive(Debug, Default)]
pub struct ErrorObject {
    message: Mutex<Option<String>>,
}

impl ErrorObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_error(&self) -> bool {
        self.message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn message(&self) -> Option<String> {
        self.message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record an error. The first message wins.
    pub fn set(&self, message: impl Into<String>) {
        let mut slot = self.message.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(message.into());
        }
    }
}

/// The runtime injected into the host.
///
/// The object is shared between the loader thread and the init thread, so
/// every instance method takes `&self`.
pub trait Runtime: Send + Sync + 'static {
    fn new(module_path: PathBuf, config: RuntimeConfig) -> Self
    where
        Self: Sized;

    /// May block for arbitrarily long. Failures go into [`Runtime::error_object`].
    fn init(&self);

    fn error_object(&self) -> &ErrorObject;

    /// Process-wide teardown, run by the unload hook. May execute while
    /// `init()` is still in flight on another thread.
    fn static_cleanup()
    where
        Self: Sized;
}
