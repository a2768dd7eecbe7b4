//! Configuration file support for Kiln.
//!
//! Kiln supports two configuration file locations:
//! - Global: `~/.kiln/config.toml` - User-wide defaults
//! - Project: `.kiln/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config, and command-line
//! flags take precedence over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::util::shell::{ColorChoice, Verbosity};

/// Name of the per-user and per-project configuration directory.
pub const CONFIG_DIR_NAME: &str = ".kiln";

/// Kiln configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Limit on each compiler, archiver, linker or test process, in seconds
    pub timeout_secs: Option<u64>,

    /// Default output verbosity
    pub verbosity: Option<Verbosity>,

    /// Default color mode
    pub color: Option<ColorChoice>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.timeout_secs.is_some() {
            self.build.timeout_secs = other.build.timeout_secs;
        }
        if other.build.verbosity.is_some() {
            self.build.verbosity = other.build.verbosity;
        }
        if other.build.color.is_some() {
            self.build.color = other.build.color;
        }
    }

    /// Process timeout, if one is configured. Zero disables it.
    pub fn timeout(&self) -> Option<Duration> {
        self.build
            .timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.kiln/config.toml)
/// 2. Global config (~/.kiln/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: Option<&Path>) -> Config {
    let mut config = Config::default();

    if let Some(path) = global_path {
        config.merge(Config::load_or_default(path));
    }

    if let Some(path) = project_path {
        config.merge(Config::load_or_default(path));
    }

    config
}

/// Get the global kiln config directory (~/.kiln).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(CONFIG_DIR_NAME))
}

/// Get the global config path (~/.kiln/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.kiln/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR_NAME).join("config.toml")
}
