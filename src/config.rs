//! Configuration loading.
//!
//! Loads `./plugboard.toml` (or `$PLUGBOARD_CONFIG_PATH`). Environment
//! variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlugboardConfig {
    /// Hotplug processing (`[hotplug]`).
    pub hotplug: HotplugConfig,
    /// Core application (`[core]`).
    pub core: CoreConfig,
    /// Filesystem paths for persistent state (`[paths]`).
    pub paths: PathsConfig,
    /// Log filtering (`[logging]`).
    pub logging: LoggingConfig,
}

impl PlugboardConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `$PLUGBOARD_CONFIG_PATH` or `./plugboard.toml`.
    /// A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// [`PlugboardConfig::load`] with a custom env resolver.
    ///
    /// # Errors
    ///
    /// See [`PlugboardConfig::load`].
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = Self::config_path_with(&env);
        let mut config = Self::load_from_file(&path)?;
        config.apply_overrides(env);
        Ok(config)
    }

    /// Load from a TOML file only, no env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("invalid config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config file {}: {e}",
                path.display()
            )),
        }
    }

    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("PLUGBOARD_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("plugboard.toml"))
    }

    /// Apply environment variable overrides. Invalid values are ignored
    /// with a warning.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("PLUGBOARD_HOTPLUG") {
            match parse_bool(&v) {
                Some(enabled) => self.hotplug.enabled = enabled,
                None => tracing::warn!(
                    var = "PLUGBOARD_HOTPLUG",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("PLUGBOARD_CORE_APP") {
            if crate::snap::is_valid_name(&v) {
                self.core.app = v;
            } else {
                tracing::warn!(var = "PLUGBOARD_CORE_APP", value = %v, "ignoring invalid env override");
            }
        }
        if let Some(v) = env("PLUGBOARD_STATE_DB") {
            self.paths.state_db = v;
        }
        if let Some(v) = env("PLUGBOARD_LOGS_DIR") {
            self.paths.logs_dir = v;
        }
        if let Some(v) = env("PLUGBOARD_LOG_LEVEL") {
            if v.is_empty() {
                tracing::warn!(var = "PLUGBOARD_LOG_LEVEL", "ignoring empty env override");
            } else {
                self.logging.level = v;
            }
        }
    }

    /// Parse a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or mistyped values.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// `[hotplug]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HotplugConfig {
    /// The "hotplug enabled" feature flag.
    pub enabled: bool,
}

impl Default for HotplugConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// `[core]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Application owning hotplug-created slots.
    pub app: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            app: crate::context::DEFAULT_CORE_APP.to_string(),
        }
    }
}

/// `[paths]`. A leading `~/` expands to the home directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// SQLite state database.
    pub state_db: String,
    /// Directory for rotated JSON logs.
    pub logs_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_db: "plugboard-state.db".to_string(),
            logs_dir: "logs".to_string(),
        }
    }
}

impl PathsConfig {
    /// Resolved state database path.
    pub fn state_db_path(&self) -> PathBuf {
        expand_home(&self.state_db)
    }

    /// Resolved logs directory.
    pub fn logs_dir_path(&self) -> PathBuf {
        expand_home(&self.logs_dir)
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match directories::BaseDirs::new() {
            Some(base) => base.home_dir().join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

/// `[logging]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
