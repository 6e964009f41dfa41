//! Application configuration model.
//!
//! Loaded from `config.toml` and overridden by environment variables by the
//! infrastructure layer; every section falls back to its defaults.

use crate::history::HISTORY_LIMIT;
use crate::session::DEFAULT_TITLE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_GREETING: &str = "Yooo! Dev siap nemenin kamu mikir!";

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub webhook: WebhookConfig,
    pub store: StoreConfig,
    pub sync: SyncConfig,
    pub chat: ChatConfig,
}

/// Question-answering webhook endpoint.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: Option<String>,
    /// Transport timeout. No timeout is applied when unset.
    pub timeout_secs: Option<u64>,
}

impl WebhookConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// REST endpoint of the durable store. Without a URL an in-memory store is used.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub url: Option<String>,
    pub key: Option<String>,
}

impl StoreConfig {
    pub fn is_remote(&self) -> bool {
        self.url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period after the last transcript change before it is written.
    pub debounce_ms: u64,
    /// Entries kept by the fallback cache.
    pub history_limit: usize,
    /// Location of the fallback cache file. Defaults to `history.json` in the
    /// config directory.
    pub cache_file: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            history_limit: HISTORY_LIMIT,
            cache_file: None,
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ChatConfig {
    /// Synthetic first assistant message of every new conversation.
    pub greeting: String,
    /// Session title used before the first question is asked.
    pub default_title: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            default_title: DEFAULT_TITLE.to_string(),
        }
    }
}
