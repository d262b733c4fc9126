//! Configuration management for Locus.
//!
//! This module provides configuration loading, saving, and defaults.
//! Configuration is stored in TOML format in a platform-appropriate location.

use crate::error::{LocusError, Result};
use crate::index::RestartPolicy;
use crate::types::RootDescriptor;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure for Locus.
///
/// ## Example Configuration File (locus.toml)
///
/// ```toml
/// [index]
/// root = "/srv/music"
/// pattern = "*.mp3"
/// recursive = true
/// case_sensitive = false
///
/// [restart]
/// max_attempts = 10
/// initial_backoff_ms = 100
/// max_backoff_ms = 30000
///
/// [general]
/// log_level = "info"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// What to index
    pub index: IndexConfig,

    /// Self-heal behaviour
    pub restart: RestartConfig,

    /// General settings
    pub general: GeneralConfig,
}

/// Root and filter of the index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory to index (None = must be given on the command line)
    pub root: Option<PathBuf>,

    /// Glob matched against file names
    pub pattern: String,

    /// Descend into subdirectories
    pub recursive: bool,

    /// Match the pattern case-sensitively
    pub case_sensitive: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            root: None,
            pattern: "*".to_string(),
            recursive: true,
            case_sensitive: false,
        }
    }
}

/// Restart policy settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RestartConfig {
    /// Consecutive failed restarts before giving up (None = never give up)
    pub max_attempts: Option<u32>,

    /// First retry delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Retry delay cap in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        RestartConfig {
            max_attempts: None,
            initial_backoff_ms: 100,
            max_backoff_ms: 30_000,
        }
    }
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default config if no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        info!(path = %path.display(), "Loading configuration");
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents).map_err(|e| LocusError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
        })?;

        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Saving configuration");
        let contents = toml::to_string_pretty(self).map_err(|e| LocusError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "locus").ok_or_else(|| LocusError::ConfigError {
            reason: "Could not determine config directory".to_string(),
        })?;

        Ok(dirs.config_dir().join("locus.toml"))
    }

    /// Build the root descriptor described by `[index]`.
    pub fn descriptor(&self) -> Result<RootDescriptor> {
        let root = self
            .index
            .root
            .clone()
            .ok_or_else(|| LocusError::ConfigError {
                reason: "No root directory configured".to_string(),
            })?;

        Ok(
            RootDescriptor::new(root, &self.index.pattern, self.index.recursive)?
                .with_case_sensitive(self.index.case_sensitive),
        )
    }

    /// Restart policy described by `[restart]`.
    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy {
            max_attempts: self.restart.max_attempts,
            initial_backoff: Duration::from_millis(self.restart.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.restart.max_backoff_ms),
        }
    }
}
