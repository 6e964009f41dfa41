//! Session synchronizer.
//!
//! Keeps the durable store in step with an in-memory [`Transcript`]:
//!
//! - a conversation starts under a provisional id; the first successful
//!   write creates the canonical session and every later write is rebound to
//!   it
//! - messages are upserted by `(session_id, order_index)`, so replaying the
//!   whole transcript is idempotent
//! - writes are debounced per conversation and serialized by a per
//!   conversation lock; both are keyed by the id the conversation started
//!   with, whichever of its ids the caller passes
//! - writes queued for a deleted conversation are discarded
//! - when the store fails, the transcript goes to the fallback cache under the
//!   same id and the failure is only logged

use crate::scheduler::DebounceScheduler;
use devai_core::auth::AuthIdentity;
use devai_core::config::DEFAULT_DEBOUNCE_MS;
use devai_core::history::{HistoryCache, HistoryEntry};
use devai_core::session::{
    ChatRepository, ChatSession, DEFAULT_TITLE, Message, SessionId, StoredMessage, Transcript,
};
use devai_core::store::TableStore;
use devai_core::{ChatError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Quiet period before a scheduled write runs.
    pub debounce: Duration,
    /// Title of sessions created before the first question.
    pub default_title: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            default_title: DEFAULT_TITLE.to_string(),
        }
    }
}

/// What [`SessionSynchronizer::upsert_message`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Result of one transcript write.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Stored remotely under the canonical id.
    Stored(SessionId),
    /// The store call failed; the transcript was written to the fallback cache.
    Cached { id: SessionId, error: ChatError },
    /// The conversation was deleted; nothing was written.
    Discarded(SessionId),
}

/// Summary of a [`SessionSynchronizer::reconcile`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Cached transcripts written to the store.
    pub replayed: usize,
    /// Of those, how many needed a new session.
    pub created: usize,
    /// Entries already in sync or holding nothing but the greeting.
    pub skipped: usize,
    pub failed: usize,
}

struct SyncState {
    repository: ChatRepository,
    cache: Arc<dyn HistoryCache>,
    default_title: String,
    /// Provisional id -> canonical id.
    bindings: Mutex<HashMap<String, String>>,
    /// Canonical id -> id the conversation started with.
    origins: Mutex<HashMap<String, String>>,
    /// Keys of deleted conversations.
    deleted: Mutex<HashSet<String>>,
    /// Canonical id -> last title written.
    titles: Mutex<HashMap<String, String>>,
    /// Conversation key -> lock serializing its writes.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn require_user(user: Option<&AuthIdentity>) -> Result<&AuthIdentity> {
    user.filter(|u| u.is_usable())
        .ok_or_else(|| ChatError::auth("Sign in to store conversations"))
}

impl SyncState {
    fn resolve(&self, id: &SessionId) -> SessionId {
        match id {
            SessionId::Provisional(key) => lock(&self.bindings)
                .get(key)
                .cloned()
                .map(SessionId::Canonical)
                .unwrap_or_else(|| id.clone()),
            SessionId::Canonical(_) => id.clone(),
        }
    }

    /// Stable key of the conversation `id` belongs to: the provisional id it
    /// started with, or the canonical id if it never had one.
    fn conversation_key(&self, id: &SessionId) -> String {
        match id {
            SessionId::Provisional(key) => key.clone(),
            SessionId::Canonical(canonical) => lock(&self.origins)
                .get(canonical)
                .cloned()
                .unwrap_or_else(|| canonical.clone()),
        }
    }

    fn is_deleted(&self, key: &str) -> bool {
        lock(&self.deleted).contains(key)
    }

    fn conversation_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(lock(&self.locks).entry(key.to_string()).or_default())
    }

    /// Returns the canonical id and whether the session row was written.
    async fn ensure_session(
        &self,
        transcript: &Transcript,
        current: &SessionId,
        user: &AuthIdentity,
    ) -> Result<(String, bool)> {
        let title = transcript.derive_title(&self.default_title);
        match self.resolve(current) {
            SessionId::Provisional(key) => {
                let session = self.repository.create_session(&user.user_id, &title).await?;
                let canonical = session.id.as_str().to_string();
                lock(&self.bindings).insert(key.clone(), canonical.clone());
                lock(&self.origins).insert(canonical.clone(), key.clone());
                lock(&self.titles).insert(canonical.clone(), title);
                tracing::info!(
                    provisional = %key,
                    session_id = %canonical,
                    "[SessionSync] Created session"
                );
                Ok((canonical, true))
            }
            SessionId::Canonical(id) => {
                let known = lock(&self.titles).get(&id).cloned();
                if known.as_deref() == Some(title.as_str()) {
                    return Ok((id, false));
                }
                self.repository.update_session_title(&id, &title).await?;
                lock(&self.titles).insert(id.clone(), title);
                Ok((id, true))
            }
        }
    }

    async fn upsert_message(
        &self,
        session_id: &str,
        message: &Message,
        order_index: u32,
    ) -> Result<UpsertOutcome> {
        match self.repository.find_message(session_id, order_index).await? {
            Some(existing) if existing.content == message.text => Ok(UpsertOutcome::Unchanged),
            Some(existing) => {
                let id = existing.id.ok_or_else(|| {
                    ChatError::persistence(format!(
                        "message {}#{} has no id",
                        session_id, order_index
                    ))
                })?;
                self.repository
                    .update_message_content(&id, &message.text)
                    .await?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                self.repository
                    .insert_message(&StoredMessage {
                        id: None,
                        session_id: session_id.to_string(),
                        role: message.role,
                        content: message.text.clone(),
                        order_index,
                        created_at: None,
                    })
                    .await?;
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    /// Writes the whole transcript, in order, under the conversation's
    /// canonical session.
    async fn write_remote(
        &self,
        key: &SessionId,
        transcript: &Transcript,
        user: Option<&AuthIdentity>,
    ) -> Result<SessionId> {
        let user = require_user(user)?;
        let (session_id, session_written) = self.ensure_session(transcript, key, user).await?;

        let mut changed = false;
        for (index, message) in transcript.messages().iter().enumerate() {
            let order_index = u32::try_from(index)
                .map_err(|_| ChatError::internal("transcript exceeds u32 messages"))?;
            let outcome = self.upsert_message(&session_id, message, order_index).await?;
            changed |= outcome != UpsertOutcome::Unchanged;
        }
        if changed && !session_written {
            self.repository.touch_session(&session_id).await?;
        }

        Ok(SessionId::Canonical(session_id))
    }

    async fn sync_transcript(
        &self,
        key: &SessionId,
        transcript: &Transcript,
        user: Option<&AuthIdentity>,
    ) -> SyncOutcome {
        let conversation_key = self.conversation_key(key);
        let conversation = self.conversation_lock(&conversation_key);
        let _guard = conversation.lock().await;

        if self.is_deleted(&conversation_key) {
            tracing::debug!(session_id = %key, "[SessionSync] Conversation deleted, write discarded");
            return SyncOutcome::Discarded(key.clone());
        }

        let title = transcript.derive_title(&self.default_title);
        match self.write_remote(key, transcript, user).await {
            Ok(canonical) => {
                if key.is_provisional() {
                    self.forget_cached(key.as_str()).await;
                }
                let entry = HistoryEntry::new(canonical.clone(), title, transcript.messages().to_vec())
                    .mark_synced();
                self.cache_put(entry).await;
                tracing::debug!(
                    session_id = %canonical,
                    messages = transcript.len(),
                    "[SessionSync] Transcript stored"
                );
                SyncOutcome::Stored(canonical)
            }
            Err(error) => {
                let id = self.resolve(key);
                if error.is_auth() {
                    tracing::debug!(session_id = %id, "[SessionSync] No identity, caching locally");
                } else {
                    tracing::warn!(
                        session_id = %id,
                        error = %error,
                        "[SessionSync] Store write failed, transcript kept in local cache"
                    );
                }
                self.cache_put(HistoryEntry::new(id.clone(), title, transcript.messages().to_vec()))
                    .await;
                SyncOutcome::Cached { id, error }
            }
        }
    }

    async fn cache_put(&self, entry: HistoryEntry) {
        let id = entry.id.clone();
        if let Err(e) = self.cache.put(entry).await {
            tracing::warn!(session_id = %id, "[SessionSync] Failed to write local cache: {}", e);
        }
    }

    async fn forget_cached(&self, id: &str) -> bool {
        match self.cache.remove(id).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(session_id = %id, "[SessionSync] Failed to update local cache: {}", e);
                false
            }
        }
    }

    fn forget_canonical(&self, canonical: &str) {
        lock(&self.bindings).retain(|_, bound| bound != canonical);
        lock(&self.origins).remove(canonical);
        lock(&self.titles).remove(canonical);
    }
}

/// Synchronizes transcripts with the durable store.
///
/// Cloning is cheap; clones share bindings, locks and pending writes.
#[derive(Clone)]
pub struct SessionSynchronizer {
    state: Arc<SyncState>,
    scheduler: DebounceScheduler,
}

impl SessionSynchronizer {
    pub fn new(
        store: Arc<dyn TableStore>,
        cache: Arc<dyn HistoryCache>,
        options: SyncOptions,
    ) -> Self {
        Self {
            state: Arc::new(SyncState {
                repository: ChatRepository::new(store),
                cache,
                default_title: options.default_title,
                bindings: Mutex::new(HashMap::new()),
                origins: Mutex::new(HashMap::new()),
                deleted: Mutex::new(HashSet::new()),
                titles: Mutex::new(HashMap::new()),
                locks: Mutex::new(HashMap::new()),
            }),
            scheduler: DebounceScheduler::new(options.debounce),
        }
    }

    /// Makes sure a canonical session exists for `current` and returns its id.
    ///
    /// A provisional id gets a new session titled after the first question;
    /// a canonical one only has its title updated when the derived title
    /// changed.
    pub async fn ensure_session(
        &self,
        transcript: &Transcript,
        current: &SessionId,
        user: &AuthIdentity,
    ) -> Result<SessionId> {
        let user = require_user(Some(user))?;
        let conversation = self
            .state
            .conversation_lock(&self.state.conversation_key(current));
        let _guard = conversation.lock().await;
        let (id, _) = self.state.ensure_session(transcript, current, user).await?;
        Ok(SessionId::Canonical(id))
    }

    /// Inserts or overwrites the message at `(session, order_index)`.
    ///
    /// A provisional id is rebound to its canonical session; one that has not
    /// been bound yet is rejected.
    pub async fn upsert_message(
        &self,
        session: &SessionId,
        message: &Message,
        order_index: u32,
    ) -> Result<UpsertOutcome> {
        match self.state.resolve(session) {
            SessionId::Canonical(id) => self.state.upsert_message(&id, message, order_index).await,
            SessionId::Provisional(id) => Err(ChatError::internal(format!(
                "session {} has no canonical id yet",
                id
            ))),
        }
    }

    /// Lists the user's stored sessions, most recent first.
    pub async fn load_sessions(&self, user: Option<&AuthIdentity>) -> Result<Vec<ChatSession>> {
        let user = require_user(user)?;
        let sessions = self.state.repository.list_sessions(&user.user_id).await?;
        let mut titles = lock(&self.state.titles);
        for session in &sessions {
            titles.insert(session.id.as_str().to_string(), session.title.clone());
        }
        Ok(sessions)
    }

    /// Reads a stored transcript in order-index order.
    pub async fn load_messages(
        &self,
        id: &SessionId,
        user: Option<&AuthIdentity>,
    ) -> Result<Transcript> {
        require_user(user)?;
        let SessionId::Canonical(session_id) = self.state.resolve(id) else {
            return Err(ChatError::not_found("session", id.as_str()));
        };
        let messages = self.state.repository.list_messages(&session_id).await?;
        Ok(Transcript::from_messages(
            messages.into_iter().map(|m| (m.role, m.content)),
        ))
    }

    /// Deletes a conversation: its pending write, its cache entries and, for
    /// a canonical session owned by `user`, the stored session and messages.
    ///
    /// A write already running for the conversation completes first; writes
    /// queued afterwards are discarded. Returns whether anything was removed.
    pub async fn delete_session(&self, id: &SessionId, user: Option<&AuthIdentity>) -> Result<bool> {
        let key = self.state.conversation_key(id);
        self.scheduler.cancel_pending(&key);
        let conversation = self.state.conversation_lock(&key);
        let _guard = conversation.lock().await;

        let resolved = self.state.resolve(id);
        let mut removed = false;
        if let SessionId::Canonical(session_id) = &resolved {
            let user = require_user(user)?;
            if self
                .state
                .repository
                .delete_session(session_id, &user.user_id)
                .await?
            {
                removed = true;
                tracing::info!(session_id = %session_id, "[SessionSync] Deleted session");
            } else if self.state.repository.find_session(session_id).await?.is_some() {
                tracing::warn!(session_id = %session_id, "[SessionSync] Session owned by another user, not deleted");
                return Ok(false);
            }
            self.state.forget_canonical(session_id);
        }

        let mut ids = vec![key, id.as_str().to_string(), resolved.as_str().to_string()];
        ids.sort_unstable();
        ids.dedup();
        for cached in &ids {
            removed |= self.state.forget_cached(cached).await;
        }
        lock(&self.state.deleted).extend(ids);
        Ok(removed)
    }

    /// Debounces a write of `transcript` for the conversation `id`.
    ///
    /// A later call for the same conversation within the debounce window
    /// replaces this one.
    pub fn schedule_sync(&self, id: &SessionId, transcript: Transcript, user: Option<AuthIdentity>) {
        let state = Arc::clone(&self.state);
        let key = id.clone();
        let conversation_key = self.state.conversation_key(id);
        self.scheduler.schedule(conversation_key, async move {
            state.sync_transcript(&key, &transcript, user.as_ref()).await;
        });
    }

    /// Writes `transcript` now, superseding any pending write for `id`.
    pub async fn sync_now(
        &self,
        id: &SessionId,
        transcript: &Transcript,
        user: Option<&AuthIdentity>,
    ) -> SyncOutcome {
        self.scheduler
            .cancel_pending(&self.state.conversation_key(id));
        self.state.sync_transcript(id, transcript, user).await
    }

    pub fn cancel_pending(&self, id: &SessionId) -> bool {
        self.scheduler
            .cancel_pending(&self.state.conversation_key(id))
    }

    /// Runs the pending write for `id` now. Returns whether there was one.
    pub async fn flush(&self, id: &SessionId) -> bool {
        self.scheduler
            .flush_pending(&self.state.conversation_key(id))
            .await
    }

    pub fn has_pending(&self, id: &SessionId) -> bool {
        self.scheduler
            .is_pending(&self.state.conversation_key(id))
    }

    /// The id writes for `id` currently go to.
    pub fn resolve(&self, id: &SessionId) -> SessionId {
        self.state.resolve(id)
    }

    /// Looks `id` up in the fallback cache, under its canonical id first.
    pub async fn cached(&self, id: &SessionId) -> Result<Option<HistoryEntry>> {
        let resolved = self.state.resolve(id);
        if let Some(entry) = self.state.cache.get(resolved.as_str()).await? {
            return Ok(Some(entry));
        }
        if resolved != *id {
            return self.state.cache.get(id.as_str()).await;
        }
        Ok(None)
    }

    /// Every cached conversation, most recently updated first.
    pub async fn cached_sessions(&self) -> Result<Vec<HistoryEntry>> {
        self.state.cache.list().await
    }

    /// Replays unsynced cache entries to the store.
    ///
    /// Provisional entries get a new session and are re-keyed in the cache;
    /// canonical entries are upserted again, or recreated when their session
    /// no longer exists.
    pub async fn reconcile(&self, user: Option<&AuthIdentity>) -> Result<ReconcileReport> {
        let user = require_user(user)?;
        let mut report = ReconcileReport::default();

        for entry in self.state.cache.list().await? {
            if entry.synced || entry.messages.len() <= 1 {
                report.skipped += 1;
                continue;
            }

            let target = match &entry.id {
                SessionId::Canonical(id) => match self.state.repository.find_session(id).await {
                    Ok(Some(_)) => entry.id.clone(),
                    Ok(None) => SessionId::Provisional(id.clone()),
                    Err(e) => {
                        tracing::warn!(session_id = %id, "[SessionSync] Reconcile lookup failed: {}", e);
                        report.failed += 1;
                        continue;
                    }
                },
                SessionId::Provisional(_) => entry.id.clone(),
            };

            let conversation = self
                .state
                .conversation_lock(&self.state.conversation_key(&entry.id));
            let _guard = conversation.lock().await;
            let transcript = Transcript::from_messages(
                entry.messages.iter().map(|m| (m.role, m.text.clone())),
            );

            match self.state.write_remote(&target, &transcript, Some(user)).await {
                Ok(canonical) => {
                    if canonical.as_str() != entry.id.as_str() {
                        report.created += 1;
                        self.state.forget_cached(entry.id.as_str()).await;
                    }
                    self.state
                        .cache_put(HistoryEntry {
                            id: canonical,
                            synced: true,
                            ..entry
                        })
                        .await;
                    report.replayed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %entry.id,
                        "[SessionSync] Reconcile write failed: {}",
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            replayed = report.replayed,
            created = report.created,
            failed = report.failed,
            "[SessionSync] Reconciliation finished"
        );
        Ok(report)
    }

    /// Runs every pending write to completion.
    pub async fn shutdown(&self) {
        let pending = self.scheduler.pending_count();
        if pending > 0 {
            tracing::debug!(pending, "[SessionSync] Flushing pending writes");
        }
        self.scheduler.flush_all().await;
    }
}
