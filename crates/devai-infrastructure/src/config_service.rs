//! Configuration service implementation.
//!
//! Loads the [`AppConfig`] from `~/.config/devai/config.toml` and applies
//! environment overrides on top.

use crate::paths::DevaiPaths;
use devai_core::config::AppConfig;
use devai_core::{ChatError, Result};
use std::path::{Path, PathBuf};

/// Environment variables consulted for each setting, highest priority first.
const WEBHOOK_URL_VARS: &[&str] = &["DEVAI_WEBHOOK_URL", "N8N_WEBHOOK_URL"];
const WEBHOOK_TIMEOUT_VARS: &[&str] = &["DEVAI_WEBHOOK_TIMEOUT_SECS"];
const STORE_URL_VARS: &[&str] = &["DEVAI_STORE_URL", "SUPABASE_URL"];
const STORE_KEY_VARS: &[&str] = &[
    "DEVAI_STORE_KEY",
    "SUPABASE_SERVICE_ROLE_KEY",
    "SUPABASE_ANON_KEY",
];
const DEBOUNCE_VARS: &[&str] = &["DEVAI_DEBOUNCE_MS"];
const CACHE_FILE_VARS: &[&str] = &["DEVAI_CACHE_FILE"];

#[derive(Debug, Clone)]
pub struct ConfigService {
    paths: DevaiPaths,
}

impl ConfigService {
    pub fn new(paths: DevaiPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &DevaiPaths {
        &self.paths
    }

    /// Loads the file (defaults when missing) and applies the process
    /// environment. The fallback cache path is resolved to an absolute path.
    pub fn load(&self) -> Result<AppConfig> {
        let path = self.paths.config_file()?;
        let mut config = Self::load_file(&path)?;
        apply_env(&mut config, |name| std::env::var(name).ok())?;

        if config.sync.cache_file.is_none() {
            config.sync.cache_file = Some(self.paths.history_file()?);
        }

        tracing::debug!(
            "[ConfigService] Loaded config from {} (webhook: {}, store: {})",
            path.display(),
            if config.webhook.url.is_some() { "set" } else { "unset" },
            if config.store.is_remote() { "remote" } else { "memory" }
        );
        Ok(config)
    }

    /// Reads a config file. A missing file yields the defaults; a malformed
    /// one is a configuration error.
    pub fn load_file(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ChatError::config(format!("{}: {}", path.display(), e)))
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new(DevaiPaths::default())
    }
}

/// Overrides `config` with values found through `lookup`.
pub fn apply_env<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let first = |names: &[&str]| {
        names
            .iter()
            .filter_map(|&name| lookup(name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    };

    if let Some(url) = first(WEBHOOK_URL_VARS) {
        config.webhook.url = Some(url);
    }
    if let Some(secs) = first(WEBHOOK_TIMEOUT_VARS) {
        config.webhook.timeout_secs = Some(parse_number(WEBHOOK_TIMEOUT_VARS[0], &secs)?);
    }
    if let Some(url) = first(STORE_URL_VARS) {
        config.store.url = Some(url);
    }
    if let Some(key) = first(STORE_KEY_VARS) {
        config.store.key = Some(key);
    }
    if let Some(ms) = first(DEBOUNCE_VARS) {
        config.sync.debounce_ms = parse_number(DEBOUNCE_VARS[0], &ms)?;
    }
    if let Some(path) = first(CACHE_FILE_VARS) {
        config.sync.cache_file = Some(PathBuf::from(path));
    }
    Ok(())
}

fn parse_number(name: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| ChatError::config(format!("{} must be a non-negative integer, got '{}'", name, value)))
}
