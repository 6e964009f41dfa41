use async_trait::async_trait;
use devai_application::{SessionSynchronizer, SyncOptions, SyncOutcome, UpsertOutcome};
use devai_core::Result;
use devai_core::auth::AuthIdentity;
use devai_core::history::{HistoryCache, HistoryEntry};
use devai_core::session::{DEFAULT_TITLE, Message, MessageRole, SessionId, Transcript};
use devai_core::store::{Filter, MESSAGES_TABLE, Query, Row, SESSIONS_TABLE, TableStore};
use devai_infrastructure::{InMemoryTableStore, MemoryHistoryCache};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const DEBOUNCE: Duration = Duration::from_millis(1000);

struct Fixture {
    store: Arc<InMemoryTableStore>,
    cache: Arc<MemoryHistoryCache>,
    sync: SessionSynchronizer,
    user: AuthIdentity,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryTableStore::new());
    let cache = Arc::new(MemoryHistoryCache::new());
    let sync = SessionSynchronizer::new(
        store.clone(),
        cache.clone(),
        SyncOptions {
            debounce: DEBOUNCE,
            ..SyncOptions::default()
        },
    );
    Fixture {
        store,
        cache,
        sync,
        user: AuthIdentity::new("user-1"),
    }
}

fn conversation(turns: &[(&str, &str)]) -> Transcript {
    let mut transcript = Transcript::with_greeting("Halo!");
    for (question, answer) in turns {
        transcript.push(MessageRole::User, *question);
        transcript.push(MessageRole::Assistant, *answer);
    }
    transcript
}

/// Delegates to the in-memory store, holding every insert for a while.
struct SlowInserts {
    inner: Arc<InMemoryTableStore>,
    delay: Duration,
}

#[async_trait]
impl TableStore for SlowInserts {
    async fn select(&self, query: Query) -> Result<Vec<Row>> {
        self.inner.select(query).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: &str, filters: Vec<Filter>, patch: Row) -> Result<Vec<Row>> {
        self.inner.update(table, filters, patch).await
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<usize> {
        self.inner.delete(table, filters).await
    }
}

fn column<'a>(row: &'a serde_json::Map<String, Value>, name: &str) -> &'a str {
    row.get(name).and_then(Value::as_str).unwrap_or_default()
}

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let f = fixture();
    let transcript = conversation(&[("stok drill?", "ada 12")]);
    let id = f
        .sync
        .ensure_session(&transcript, &SessionId::provisional(), &f.user)
        .await
        .unwrap();

    let message = transcript.messages()[1].clone();
    let first = f.sync.upsert_message(&id, &message, 1).await.unwrap();
    let second = f.sync.upsert_message(&id, &message, 1).await.unwrap();
    assert_eq!(first, UpsertOutcome::Inserted);
    assert_eq!(second, UpsertOutcome::Unchanged);
    assert_eq!(f.store.rows(MESSAGES_TABLE).len(), 1, "Same key must leave one row");

    let finalized = Message {
        text: "stok drill? (edited)".to_string(),
        ..message
    };
    let third = f.sync.upsert_message(&id, &finalized, 1).await.unwrap();
    assert_eq!(third, UpsertOutcome::Updated);
    let rows = f.store.rows(MESSAGES_TABLE);
    assert_eq!(rows.len(), 1);
    assert_eq!(column(&rows[0], "content"), "stok drill? (edited)");
}

#[tokio::test]
async fn test_provisional_id_is_rebound_to_canonical() {
    let f = fixture();
    let provisional = SessionId::provisional();
    let transcript = conversation(&[("Where is gudang A?", "Jalan Merdeka")]);

    let canonical = f
        .sync
        .ensure_session(&transcript, &provisional, &f.user)
        .await
        .unwrap();
    assert!(canonical.is_canonical());
    assert_ne!(canonical.as_str(), provisional.as_str());
    assert_eq!(f.sync.resolve(&provisional), canonical);

    for (index, message) in transcript.messages().iter().enumerate() {
        f.sync
            .upsert_message(&provisional, message, index as u32)
            .await
            .unwrap();
    }
    let rows = f.store.rows(MESSAGES_TABLE);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| column(r, "session_id") == canonical.as_str()));

    // A second ensure for the same conversation must not create another session.
    let again = f
        .sync
        .ensure_session(&transcript, &provisional, &f.user)
        .await
        .unwrap();
    assert_eq!(again, canonical);
    let sessions = f.store.rows(SESSIONS_TABLE);
    assert_eq!(sessions.len(), 1);
    assert_eq!(column(&sessions[0], "title"), "Where is gudang A?");
}

#[tokio::test]
async fn test_unbound_provisional_upsert_is_rejected() {
    let f = fixture();
    let message = conversation(&[]).messages()[0].clone();
    let err = f
        .sync
        .upsert_message(&SessionId::provisional(), &message, 0)
        .await
        .unwrap_err();
    assert!(!err.is_user_visible());
    assert!(f.store.rows(MESSAGES_TABLE).is_empty());
}

#[tokio::test]
async fn test_title_updates_only_when_changed() {
    let f = fixture();
    let provisional = SessionId::provisional();
    let greeting_only = Transcript::with_greeting("Halo!");
    f.sync
        .ensure_session(&greeting_only, &provisional, &f.user)
        .await
        .unwrap();
    assert_eq!(column(&f.store.rows(SESSIONS_TABLE)[0], "title"), DEFAULT_TITLE);

    let asked = conversation(&[("A question that is definitely longer than thirty", "ok")]);
    f.sync.ensure_session(&asked, &provisional, &f.user).await.unwrap();
    let title = column(&f.store.rows(SESSIONS_TABLE)[0], "title").to_string();
    assert_eq!(title, "A question that is definitely ");

    let calls = f.store.call_count();
    f.sync.ensure_session(&asked, &provisional, &f.user).await.unwrap();
    assert_eq!(f.store.call_count(), calls, "Unchanged title must not be written");
}

#[tokio::test]
async fn test_store_failure_falls_back_to_cache() {
    let f = fixture();
    f.store.set_unavailable(true);
    let provisional = SessionId::provisional();
    let transcript = conversation(&[("ping", "pong")]);
    let before = transcript.clone();

    let err = f
        .sync
        .ensure_session(&transcript, &provisional, &f.user)
        .await
        .unwrap_err();
    assert!(err.is_persistence());

    let outcome = f.sync.sync_now(&provisional, &transcript, Some(&f.user)).await;
    match outcome {
        SyncOutcome::Cached { id, error } => {
            assert_eq!(id, provisional);
            assert!(error.is_persistence());
        }
        other => panic!("expected cached outcome, got {other:?}"),
    }

    let entry = f.cache.get(provisional.as_str()).await.unwrap().unwrap();
    assert_eq!(entry.messages, transcript.messages());
    assert_eq!(entry.title, "ping");
    assert!(!entry.synced);
    assert_eq!(transcript, before);
}

#[tokio::test]
async fn test_successful_sync_replaces_provisional_cache_entry() {
    let f = fixture();
    let provisional = SessionId::provisional();
    let transcript = conversation(&[("q", "a")]);

    f.store.set_unavailable(true);
    f.sync.sync_now(&provisional, &transcript, Some(&f.user)).await;
    f.store.set_unavailable(false);

    let outcome = f.sync.sync_now(&provisional, &transcript, Some(&f.user)).await;
    let SyncOutcome::Stored(canonical) = outcome else {
        panic!("expected stored outcome");
    };

    assert!(f.cache.get(provisional.as_str()).await.unwrap().is_none());
    let entry = f.cache.get(canonical.as_str()).await.unwrap().unwrap();
    assert!(entry.synced);
    assert_eq!(f.store.rows(MESSAGES_TABLE).len(), 3);
}

#[tokio::test]
async fn test_missing_identity_only_caches() {
    let f = fixture();
    let provisional = SessionId::provisional();
    let outcome = f
        .sync
        .sync_now(&provisional, &conversation(&[("q", "a")]), None)
        .await;

    assert!(matches!(outcome, SyncOutcome::Cached { ref error, .. } if error.is_auth()));
    assert_eq!(f.store.call_count(), 0);
    assert!(f.cache.get(provisional.as_str()).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_mutation_burst_is_written_once() {
    let f = fixture();
    let provisional = SessionId::provisional();
    let mut transcript = Transcript::with_greeting("Halo!");

    for i in 0..5 {
        transcript.push(MessageRole::User, format!("question {i}"));
        f.sync
            .schedule_sync(&provisional, transcript.clone(), Some(f.user.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert_eq!(f.store.call_count(), 0, "Nothing is written inside the window");
    assert!(f.sync.has_pending(&provisional));

    tokio::time::sleep(DEBOUNCE * 2).await;

    // One flush: create the session, then a lookup and an insert per message.
    assert_eq!(f.store.call_count(), 1 + 2 * transcript.len());
    assert_eq!(f.store.rows(SESSIONS_TABLE).len(), 1);
    assert_eq!(f.store.rows(MESSAGES_TABLE).len(), transcript.len());
    assert!(!f.sync.has_pending(&provisional));
}

#[tokio::test(start_paused = true)]
async fn test_later_flushes_reuse_the_session() {
    let f = fixture();
    let provisional = SessionId::provisional();
    let mut transcript = conversation(&[("first", "one")]);

    f.sync
        .schedule_sync(&provisional, transcript.clone(), Some(f.user.clone()));
    tokio::time::sleep(DEBOUNCE * 2).await;

    transcript.push(MessageRole::User, "second");
    f.sync
        .schedule_sync(&provisional, transcript.clone(), Some(f.user.clone()));
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert_eq!(f.store.rows(SESSIONS_TABLE).len(), 1);
    let canonical = f.sync.resolve(&provisional);
    let rows = f.store.rows(MESSAGES_TABLE);
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| column(r, "session_id") == canonical.as_str()));
}

#[tokio::test]
async fn test_shutdown_runs_pending_writes() {
    let f = fixture();
    let provisional = SessionId::provisional();
    f.sync.schedule_sync(
        &provisional,
        conversation(&[("q", "a")]),
        Some(f.user.clone()),
    );

    f.sync.shutdown().await;
    assert_eq!(f.store.rows(MESSAGES_TABLE).len(), 3);
    assert!(!f.sync.has_pending(&provisional));
}

#[tokio::test]
async fn test_load_projections_are_ordered() {
    let f = fixture();
    let first = f
        .sync
        .sync_now(&SessionId::provisional(), &conversation(&[("older", "a")]), Some(&f.user))
        .await;
    let second = f
        .sync
        .sync_now(&SessionId::provisional(), &conversation(&[("newer", "b")]), Some(&f.user))
        .await;
    let (SyncOutcome::Stored(first), SyncOutcome::Stored(second)) = (first, second) else {
        panic!("both transcripts should be stored");
    };

    let sessions = f.sync.load_sessions(Some(&f.user)).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions[0].updated_at >= sessions[1].updated_at);
    let ids: Vec<&SessionId> = sessions.iter().map(|s| &s.id).collect();
    assert!(ids.contains(&&first) && ids.contains(&&second));

    let transcript = f.sync.load_messages(&second, Some(&f.user)).await.unwrap();
    let texts: Vec<&str> = transcript.messages().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["Halo!", "newer", "b"]);
    assert_eq!(transcript.messages()[1].role, MessageRole::User);
}

#[tokio::test]
async fn test_session_operations_require_identity() {
    let f = fixture();
    let err = f.sync.load_sessions(None).await.unwrap_err();
    assert!(err.is_auth());

    let anonymous = AuthIdentity::new("  ");
    let err = f
        .sync
        .ensure_session(&conversation(&[]), &SessionId::provisional(), &anonymous)
        .await
        .unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_delete_checks_ownership_and_cascades() {
    let f = fixture();
    let outcome = f
        .sync
        .sync_now(&SessionId::provisional(), &conversation(&[("q", "a")]), Some(&f.user))
        .await;
    let SyncOutcome::Stored(canonical) = outcome else {
        panic!("expected stored outcome");
    };

    let intruder = AuthIdentity::new("user-2");
    f.sync.delete_session(&canonical, Some(&intruder)).await.unwrap();
    assert_eq!(f.store.rows(SESSIONS_TABLE).len(), 1, "Only the owner may delete");

    assert!(f.sync.delete_session(&canonical, Some(&f.user)).await.unwrap());
    assert!(f.store.rows(SESSIONS_TABLE).is_empty());
    assert!(f.store.rows(MESSAGES_TABLE).is_empty());
    assert!(f.cache.get(canonical.as_str()).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_delete_by_canonical_id_cancels_pending_write() {
    let f = fixture();
    let provisional = SessionId::provisional();
    let mut transcript = conversation(&[("q", "a")]);
    f.sync.sync_now(&provisional, &transcript, Some(&f.user)).await;
    let canonical = f.sync.resolve(&provisional);
    assert!(!canonical.is_provisional());

    transcript.push(MessageRole::User, "follow-up");
    f.sync
        .schedule_sync(&provisional, transcript.clone(), Some(f.user.clone()));
    assert!(f.sync.has_pending(&canonical));

    assert!(f.sync.delete_session(&canonical, Some(&f.user)).await.unwrap());
    assert!(!f.sync.has_pending(&provisional));
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert!(f.store.rows(SESSIONS_TABLE).is_empty());
    assert!(f.store.rows(MESSAGES_TABLE).is_empty());
    assert!(f.cache.list().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_delete_waits_for_running_write() {
    let store = Arc::new(InMemoryTableStore::new());
    let cache = Arc::new(MemoryHistoryCache::new());
    let slow = Arc::new(SlowInserts {
        inner: store.clone(),
        delay: Duration::from_millis(200),
    });
    let sync = SessionSynchronizer::new(
        slow,
        cache.clone(),
        SyncOptions {
            debounce: DEBOUNCE,
            ..SyncOptions::default()
        },
    );
    let user = AuthIdentity::new("user-1");
    let provisional = SessionId::provisional();
    let mut transcript = conversation(&[("q", "a")]);
    sync.sync_now(&provisional, &transcript, Some(&user)).await;
    let canonical = sync.resolve(&provisional);

    transcript.push(MessageRole::User, "follow-up");
    transcript.push(MessageRole::Assistant, "more");
    sync.schedule_sync(&provisional, transcript, Some(user.clone()));
    tokio::time::sleep(DEBOUNCE + Duration::from_millis(50)).await;
    assert!(!sync.has_pending(&provisional), "The write is already running");

    assert!(sync.delete_session(&canonical, Some(&user)).await.unwrap());
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert!(store.rows(SESSIONS_TABLE).is_empty());
    assert!(store.rows(MESSAGES_TABLE).is_empty());
    assert!(cache.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_writes_after_delete_are_discarded() {
    let f = fixture();
    let provisional = SessionId::provisional();
    let transcript = conversation(&[("q", "a")]);
    f.sync.sync_now(&provisional, &transcript, Some(&f.user)).await;
    let canonical = f.sync.resolve(&provisional);
    f.sync.delete_session(&provisional, Some(&f.user)).await.unwrap();

    for id in [&provisional, &canonical] {
        let outcome = f.sync.sync_now(id, &transcript, Some(&f.user)).await;
        assert_eq!(outcome, SyncOutcome::Discarded(id.clone()));
    }
    assert!(f.store.rows(SESSIONS_TABLE).is_empty());
    assert!(f.cache.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reconcile_replays_unsynced_entries() {
    let f = fixture();
    let offline = SessionId::provisional();
    f.store.set_unavailable(true);
    f.sync
        .sync_now(&offline, &conversation(&[("offline q", "offline a")]), Some(&f.user))
        .await;
    f.store.set_unavailable(false);

    f.cache
        .put(HistoryEntry::new(
            SessionId::provisional(),
            DEFAULT_TITLE,
            Transcript::with_greeting("Halo!").messages().to_vec(),
        ))
        .await
        .unwrap();

    let report = f.sync.reconcile(Some(&f.user)).await.unwrap();
    assert_eq!(report.replayed, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);

    let canonical = f.sync.resolve(&offline);
    assert!(canonical.is_canonical());
    assert!(f.cache.get(offline.as_str()).await.unwrap().is_none());
    assert!(f.cache.get(canonical.as_str()).await.unwrap().unwrap().synced);
    assert_eq!(f.store.rows(MESSAGES_TABLE).len(), 3);

    let again = f.sync.reconcile(Some(&f.user)).await.unwrap();
    assert_eq!(again.replayed, 0);
    assert_eq!(f.store.rows(SESSIONS_TABLE).len(), 1);
}

#[tokio::test]
async fn test_reconcile_recreates_deleted_canonical_session() {
    let f = fixture();
    let stale = SessionId::canonical("00000000-0000-4000-8000-000000000000");
    f.cache
        .put(HistoryEntry::new(
            stale.clone(),
            "q",
            conversation(&[("q", "a")]).messages().to_vec(),
        ))
        .await
        .unwrap();

    let report = f.sync.reconcile(Some(&f.user)).await.unwrap();
    assert_eq!(report.created, 1);
    assert!(f.cache.get(stale.as_str()).await.unwrap().is_none());

    let sessions = f.store.rows(SESSIONS_TABLE);
    assert_eq!(sessions.len(), 1);
    assert_ne!(column(&sessions[0], "id"), stale.as_str());
}
