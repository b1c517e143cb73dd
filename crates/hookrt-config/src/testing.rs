//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - An isolated fake home directory (global config)
//! - A module directory (module-local `hookrt.toml`)
//! - A project/working directory (project config, crash logs)
//!
//! # Usage
//!
//! ```ignore
//! use hookrt_config::testing::TestEnvironment;
//!
//! let env = TestEnvironment::new()?;
//! env.write_module_config("[crash]\nfull_memory_dump = true\n")?;
//! let config = Config::load_from(&env.sources(), |_| None)?;
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

use crate::{ConfigSources, MODULE_CONFIG_FILE};

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with unique paths
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Stand-in for `$HOME`
    pub home_dir: PathBuf,
    /// Directory the injected module would live in
    pub module_dir: PathBuf,
    /// Working directory of the simulated host process
    pub project_root: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        let home_dir = root.join("home");
        let module_dir = root.join("module");
        let project_root = root.join("project");

        std::fs::create_dir_all(home_dir.join(".hookrt"))?;
        std::fs::create_dir_all(&module_dir)?;
        std::fs::create_dir_all(project_root.join(".hookrt"))?;

        Ok(Self {
            _temp_dir: temp_dir,
            home_dir,
            module_dir,
            project_root,
            test_id,
        })
    }

    pub fn global_config_path(&self) -> PathBuf {
        self.home_dir.join(".hookrt").join("config.toml")
    }

    pub fn module_config_path(&self) -> PathBuf {
        self.module_dir.join(MODULE_CONFIG_FILE)
    }

    pub fn project_config_path(&self) -> PathBuf {
        self.project_root.join(".hookrt").join("config.toml")
    }

    pub fn write_global_config(&self, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.global_config_path();
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_module_config(&self, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.module_config_path();
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_project_config(&self, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.project_config_path();
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Config sources rooted in this environment instead of the real home/cwd.
    pub fn sources(&self) -> ConfigSources {
        ConfigSources {
            global: Some(self.global_config_path()),
            module: Some(self.module_config_path()),
            project: Some(self.project_config_path()),
        }
    }

    /// Crash logs (`crash_*.log`) currently present in the project root, sorted.
    pub fn crash_logs(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut logs = Vec::new();
        for entry in std::fs::read_dir(&self.project_root)? {
            let path = entry?.path();
            let is_crash_log = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("crash_") && n.ends_with(".log"));
            if is_crash_log {
                logs.push(path);
            }
        }
        logs.sort();
        Ok(logs)
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
