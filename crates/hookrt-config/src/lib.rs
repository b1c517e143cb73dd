//! # hookrt-config
//!
//! Configuration management for the hookrt injected runtime.
//!
//! Loads configuration from (later sources override earlier ones):
//! 1. `~/.hookrt/config.toml` (global)
//! 2. `hookrt.toml` next to the injected module (module-local)
//! 3. `.hookrt/config.toml` in the working directory (project-local)
//! 4. Environment variables (highest priority)

pub mod logging;
pub mod testing;

pub use logging::LogLevel;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tracing::debug;

/// File name of the settings file that sits next to the injected module.
pub const MODULE_CONFIG_FILE: &str = "hookrt.toml";

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap_or_else(PoisonError::into_inner)
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = new_config;
    Ok(())
}

/// Reload config including the settings file in `module_dir`
pub fn reload_for_module(module_dir: &Path) -> Result<(), ConfigError> {
    let new_config = Config::load_for_module(module_dir)?;
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Where configuration layers are read from. Missing files are skipped.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub global: Option<PathBuf>,
    pub module: Option<PathBuf>,
    pub project: Option<PathBuf>,
}

impl ConfigSources {
    /// Standard locations, optionally including the module-local file.
    pub fn standard(module_dir: Option<&Path>) -> Self {
        Self {
            global: Config::global_config_path(),
            module: module_dir.map(|dir| dir.join(MODULE_CONFIG_FILE)),
            project: Some(PathBuf::from(".hookrt/config.toml")),
        }
    }

    fn layers(&self) -> impl Iterator<Item = &Path> {
        [&self.global, &self.module, &self.project]
            .into_iter()
            .filter_map(|p| p.as_deref())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crash: CrashConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&ConfigSources::standard(None), |key| std::env::var(key).ok())
    }

    /// Load config from standard locations plus `<module_dir>/hookrt.toml`
    pub fn load_for_module(module_dir: &Path) -> Result<Self, ConfigError> {
        Self::load_from(&ConfigSources::standard(Some(module_dir)), |key| {
            std::env::var(key).ok()
        })
    }

    /// Load config from explicit sources with an injectable environment lookup.
    pub fn load_from<F>(sources: &ConfigSources, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut merged = toml::Table::new();

        for path in sources.layers() {
            if !path.exists() {
                continue;
            }
            debug!("Loading config layer from {:?}", path);
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let layer: toml::Table =
                toml::from_str(&contents).map_err(|source| ConfigError::Toml {
                    path: path.to_path_buf(),
                    source,
                })?;
            merge_tables(&mut merged, layer);
        }

        let mut config: Config =
            Config::deserialize(toml::Value::Table(merged)).map_err(|source| ConfigError::Toml {
                path: PathBuf::from("<merged>"),
                source,
            })?;
        config.apply_env_overrides(env)?;
        Ok(config)
    }

    /// Global config path: ~/.hookrt/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".hookrt/config.toml"))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = env("HOOKRT_CRASH_ENABLED") {
            self.crash.enabled = parse_bool("HOOKRT_CRASH_ENABLED", value)?;
        }
        if let Some(value) = env("HOOKRT_FULL_MEMORY_DUMP") {
            self.crash.full_memory_dump = parse_bool("HOOKRT_FULL_MEMORY_DUMP", value)?;
        }
        if let Some(value) = env("HOOKRT_LOG_LEVEL") {
            self.logging.level = value
                .parse()
                .map_err(|_| ConfigError::InvalidEnv {
                    key: "HOOKRT_LOG_LEVEL",
                    value,
                })?;
        }
        Ok(())
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { key, value }),
    }
}

/// Recursively overlay `overlay` onto `base`; nested tables merge, scalars replace.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

/// Crash diagnostics configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashConfig {
    /// Install the fatal-signal guard during runtime initialization
    pub enabled: bool,
    /// Append the process memory map to every crash log
    pub full_memory_dump: bool,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            full_memory_dump: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
        }
    }
}
