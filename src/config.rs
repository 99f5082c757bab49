//! Configuration management for Shellac.
//!
//! Handles loading configuration from TOML files, with settings for the
//! interactive session and for history persistence.

use crate::error::{Result, ShellacError};
use crate::history::DEFAULT_MAX_ENTRIES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for Shellac.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Interactive session settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// History settings.
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Interactive session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Prompt delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Word that leaves the current mode.
    #[serde(default = "default_exit_command")]
    pub exit_command: String,

    /// Collapse `key=value` words into single arguments before binding.
    #[serde(default = "default_true")]
    pub normalize_key_values: bool,
}

fn default_delimiter() -> String {
    "shellac$".to_string()
}

fn default_exit_command() -> String {
    "exit".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            exit_command: default_exit_command(),
            normalize_key_values: true,
        }
    }
}

/// Where persisted history lives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Kept in memory for the lifetime of the process.
    #[default]
    Memory,
    /// Stored in a SQLite database.
    Sqlite,
}

/// History settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryConfig {
    /// Identifier the history is persisted under. No persistence when unset.
    #[serde(default)]
    pub id: Option<String>,

    /// Number of entries kept.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Storage backend.
    #[serde(default)]
    pub storage: StorageBackend,

    /// Database path for the SQLite backend. Defaults to the data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            id: None,
            max_entries: default_max_entries(),
            storage: StorageBackend::default(),
            path: None,
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shellac")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ShellacError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses and validates configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            ShellacError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.history.max_entries == 0 {
            return Err(ShellacError::config("history.max_entries must be positive"));
        }
        if self.session.exit_command.trim().is_empty() {
            return Err(ShellacError::config("session.exit_command must not be empty"));
        }
        Ok(())
    }
}
