//! Fallback cache implementations.

use crate::storage::AtomicJsonFile;
use async_trait::async_trait;
use devai_core::history::{HISTORY_LIMIT, HistoryCache, HistoryEntry, HistorySnapshot};
use devai_core::{ChatError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// History cache persisted as a single JSON file.
///
/// File I/O runs on the blocking pool; the async mutex keeps writers from one
/// process in order, the file lock covers other processes.
#[derive(Clone)]
pub struct JsonFileHistoryCache {
    file: Arc<AtomicJsonFile<HistorySnapshot>>,
    limit: usize,
    write_guard: Arc<Mutex<()>>,
}

impl JsonFileHistoryCache {
    pub fn new(path: PathBuf) -> Self {
        Self::with_limit(path, HISTORY_LIMIT)
    }

    pub fn with_limit(path: PathBuf, limit: usize) -> Self {
        Self {
            file: Arc::new(AtomicJsonFile::new(path)),
            limit,
            write_guard: Arc::new(Mutex::new(())),
        }
    }

    async fn read(&self) -> Result<HistorySnapshot> {
        let file = Arc::clone(&self.file);
        blocking(move || Ok(file.load()?.unwrap_or_default())).await
    }

    async fn modify<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut HistorySnapshot) -> R + Send + 'static,
        R: Send + 'static,
    {
        let _guard = self.write_guard.lock().await;
        let file = Arc::clone(&self.file);
        blocking(move || file.update(HistorySnapshot::new(), f)).await
    }
}

async fn blocking<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ChatError::internal(format!("History cache task failed: {}", e)))?
}

#[async_trait]
impl HistoryCache for JsonFileHistoryCache {
    async fn put(&self, entry: HistoryEntry) -> Result<()> {
        let limit = self.limit;
        tracing::debug!(session_id = %entry.id, "[HistoryCache] writing entry");
        self.modify(move |snapshot| snapshot.upsert(entry, limit)).await
    }

    async fn get(&self, id: &str) -> Result<Option<HistoryEntry>> {
        Ok(self.read().await?.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.read().await?.entries().to_vec())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.modify(move |snapshot| snapshot.remove(&id)).await
    }
}

/// History cache held in memory, for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct MemoryHistoryCache {
    snapshot: Arc<Mutex<HistorySnapshot>>,
    limit: Option<usize>,
}

impl MemoryHistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

#[async_trait]
impl HistoryCache for MemoryHistoryCache {
    async fn put(&self, entry: HistoryEntry) -> Result<()> {
        let limit = self.limit.unwrap_or(HISTORY_LIMIT);
        self.snapshot.lock().await.upsert(entry, limit);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<HistoryEntry>> {
        Ok(self.snapshot.lock().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.snapshot.lock().await.entries().to_vec())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.snapshot.lock().await.remove(id))
    }
}
