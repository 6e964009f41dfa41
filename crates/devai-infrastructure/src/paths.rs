//! Unified path management for devai files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/devai/
//! ├── config.toml      # Application configuration
//! ├── history.json     # Fallback cache of recent conversations
//! └── logs/            # Application logs
//!     └── devai.log.YYYY-MM-DD
//! ```

use devai_core::{ChatError, Result};
use std::path::PathBuf;

const APP_DIR: &str = "devai";

/// Resolves devai's file locations.
///
/// The base directory defaults to the platform config directory and can be
/// overridden (tests point it at a temporary directory).
#[derive(Debug, Clone, Default)]
pub struct DevaiPaths {
    base: Option<PathBuf>,
}

impl DevaiPaths {
    pub fn new(base: Option<PathBuf>) -> Self {
        Self { base }
    }

    /// Returns the configuration directory (e.g. `~/.config/devai/`).
    pub fn config_dir(&self) -> Result<PathBuf> {
        match &self.base {
            Some(base) => Ok(base.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or_else(|| ChatError::config("Cannot find home directory")),
        }
    }

    pub fn config_file(&self) -> Result<PathBuf> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    pub fn history_file(&self) -> Result<PathBuf> {
        Ok(self.config_dir()?.join("history.json"))
    }

    pub fn logs_dir(&self) -> Result<PathBuf> {
        Ok(self.config_dir()?.join("logs"))
    }
}
