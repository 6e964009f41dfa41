//! Local fallback cache of recent conversations.
//!
//! When the remote store is unreachable, the full transcript is written here
//! under the same (provisional or canonical) id. The cache keeps the most
//! recently updated entries only.

use crate::error::Result;
use crate::session::{ChatSession, Message, SessionId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Number of entries retained by the fallback cache.
pub const HISTORY_LIMIT: usize = 20;

/// One cached conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: SessionId,
    pub title: String,
    pub messages: Vec<Message>,
    /// Unix milliseconds of the last write.
    pub timestamp: i64,
    /// Whether the transcript is known to be stored remotely. Unsynced
    /// entries are what reconciliation replays.
    #[serde(default)]
    pub synced: bool,
}

impl HistoryEntry {
    pub fn new(id: SessionId, title: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id,
            title: title.into(),
            messages,
            timestamp: chrono::Utc::now().timestamp_millis(),
            synced: false,
        }
    }

    pub fn mark_synced(mut self) -> Self {
        self.synced = true;
        self
    }

    /// Projects the entry as a session summary for history listings.
    pub fn summary(&self) -> ChatSession {
        let updated_at = chrono::DateTime::from_timestamp_millis(self.timestamp)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        ChatSession {
            id: self.id.clone(),
            title: self.title.clone(),
            updated_at,
        }
    }
}

/// Bounded, recency-ordered list of entries shared by cache implementations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistorySnapshot {
    entries: Vec<HistoryEntry>,
}

impl HistorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entry with the same id (or adds it), re-sorts newest first
    /// and truncates to `limit`.
    pub fn upsert(&mut self, entry: HistoryEntry, limit: usize) {
        match self.entries.iter_mut().find(|e| e.id.as_str() == entry.id.as_str()) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self.entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.entries.truncate(limit);
    }

    pub fn get(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id.as_str() == id)
    }

    /// Removes the entry with `id`; returns whether one existed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id.as_str() != id);
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key-value snapshot store used when the remote store is unreachable.
#[async_trait]
pub trait HistoryCache: Send + Sync {
    /// Writes (or replaces) the entry for `entry.id`.
    async fn put(&self, entry: HistoryEntry) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<HistoryEntry>>;

    /// All entries, most recently updated first.
    async fn list(&self) -> Result<Vec<HistoryEntry>>;

    async fn remove(&self, id: &str) -> Result<bool>;
}
