//! Thread-per-task spawning for fire-and-forget work.

use std::io;
use std::thread;

/// A unit of work that owns everything it touches.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Spawner {
    /// Start `task` without waiting for it. Errors only if the task could
    /// not be started at all.
    fn spawn(&self, task: Task) -> io::Result<()>;
}

/// Runs each task on a fresh OS thread that nobody joins.
#[derive(Debug, Clone)]
pub struct DetachedSpawner {
    name: String,
}

impl DetachedSpawner {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for DetachedSpawner {
    fn default() -> Self {
        Self::new("hookrt-init")
    }
}

impl Spawner for DetachedSpawner {
    fn spawn(&self, task: Task) -> io::Result<()> {
        // Dropping the JoinHandle detaches the thread.
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(task)
            .map(drop)
    }
}
