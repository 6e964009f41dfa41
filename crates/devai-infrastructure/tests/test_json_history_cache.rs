use devai_core::history::{HistoryCache, HistoryEntry};
use devai_core::session::{MessageRole, SessionId, Transcript};
use devai_infrastructure::JsonFileHistoryCache;
use tempfile::TempDir;

fn transcript(question: &str) -> Transcript {
    let mut transcript = Transcript::with_greeting("Halo");
    transcript.push(MessageRole::User, question);
    transcript.push(MessageRole::Assistant, "answer");
    transcript
}

#[tokio::test]
async fn entries_survive_a_new_cache_instance() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.json");

    let id = SessionId::provisional();
    let cache = JsonFileHistoryCache::new(path.clone());
    cache
        .put(HistoryEntry::new(
            id.clone(),
            "where is it?",
            transcript("where is it?").messages().to_vec(),
        ))
        .await
        .unwrap();

    let reopened = JsonFileHistoryCache::new(path);
    let entry = reopened.get(id.as_str()).await.unwrap().unwrap();
    assert_eq!(entry.id, id);
    assert_eq!(entry.title, "where is it?");
    assert_eq!(entry.messages.len(), 3);
}

#[tokio::test]
async fn cache_keeps_only_the_most_recent_entries() {
    let temp_dir = TempDir::new().unwrap();
    let cache = JsonFileHistoryCache::with_limit(temp_dir.path().join("history.json"), 3);

    for i in 0..5 {
        let mut entry = HistoryEntry::new(SessionId::canonical(format!("s{i}")), "t", Vec::new());
        entry.timestamp = 1_000 + i;
        cache.put(entry).await.unwrap();
    }

    let ids: Vec<String> = cache
        .list()
        .await
        .unwrap()
        .iter()
        .map(|e| e.id.as_str().to_string())
        .collect();
    assert_eq!(ids, ["s4", "s3", "s2"]);
}

#[tokio::test]
async fn put_replaces_and_remove_deletes() {
    let temp_dir = TempDir::new().unwrap();
    let cache = JsonFileHistoryCache::new(temp_dir.path().join("history.json"));
    let id = SessionId::canonical("abc");

    cache
        .put(HistoryEntry::new(id.clone(), "first", Vec::new()))
        .await
        .unwrap();
    cache
        .put(HistoryEntry::new(
            id.clone(),
            "second",
            transcript("q").messages().to_vec(),
        ))
        .await
        .unwrap();

    let all = cache.list().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "second");

    assert!(cache.remove("abc").await.unwrap());
    assert!(cache.list().await.unwrap().is_empty());
    assert!(!cache.remove("abc").await.unwrap());
}

#[tokio::test]
async fn missing_file_reads_as_empty() {
    let temp_dir = TempDir::new().unwrap();
    let cache = JsonFileHistoryCache::new(temp_dir.path().join("none").join("history.json"));
    assert!(cache.list().await.unwrap().is_empty());
    assert!(cache.get("x").await.unwrap().is_none());
}
