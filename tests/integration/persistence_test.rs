//! History persistence through the key-value stores.

use pretty_assertions::assert_eq;
use shellac::config::Config;
use shellac::history::history_key;
use shellac::persistence::{KeyValueStore, MemoryStore, SqliteStore};
use shellac::session::{Action, BufferOutput, Session};
use std::sync::Arc;
use tempfile::tempdir;

fn session_with(store: Arc<dyn KeyValueStore>, id: &str, max_entries: usize) -> Session {
    let mut config = Config::default();
    config.history.id = Some(id.to_string());
    config.history.max_entries = max_entries;

    let session = Session::builder()
        .config(config)
        .output(Arc::new(BufferOutput::new()))
        .store(store)
        .build();
    session
        .with_registry(|r| {
            r.command("noop [x...]")
                .action(Action::sync(|_| Ok(None)))
                .register()?;
            r.mode("sub")
                .action(Action::sync(|_| Ok(None)))
                .register()
        })
        .unwrap();
    session
}

#[tokio::test]
async fn test_history_survives_new_session() {
    let dir = tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> =
        Arc::new(SqliteStore::open(&dir.path().join("history.db")).await.unwrap());

    let first = session_with(Arc::clone(&store), "app", 500);
    first.submit("noop a").await.unwrap();
    first.submit("noop b").await.unwrap();

    let second = session_with(Arc::clone(&store), "app", 500);
    second.load_history().await.unwrap();
    assert_eq!(second.history_entries(), vec!["noop a", "noop b"]);
    assert_eq!(second.history_previous().as_deref(), Some("noop b"));
}

#[tokio::test]
async fn test_history_is_stored_as_json_array() {
    let store = Arc::new(MemoryStore::new());
    let session = session_with(store.clone(), "demo", 500);
    session.submit("noop 1").await.unwrap();

    let raw = store.get(&history_key("demo")).await.unwrap();
    assert_eq!(raw.as_deref(), Some(r#"["noop 1"]"#));
}

#[tokio::test]
async fn test_persisted_history_keeps_newest_entries() {
    let store = Arc::new(MemoryStore::new());
    let session = session_with(store.clone(), "capped", 2);
    for line in ["noop 1", "noop 2", "noop 3"] {
        session.submit(line).await.unwrap();
    }

    let raw = store.get(&history_key("capped")).await.unwrap();
    assert_eq!(raw.as_deref(), Some(r#"["noop 2","noop 3"]"#));
}

#[tokio::test]
async fn test_mode_lines_are_not_persisted() {
    let store = Arc::new(MemoryStore::new());
    let session = session_with(store.clone(), "modes", 500);

    session.submit("sub").await.unwrap();
    session.submit("inside").await.unwrap();

    let raw = store.get(&history_key("modes")).await.unwrap();
    assert_eq!(raw.as_deref(), Some(r#"["sub"]"#));
}

#[tokio::test]
async fn test_different_ids_do_not_mix() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let one = session_with(Arc::clone(&store), "one", 500);
    let two = session_with(Arc::clone(&store), "two", 500);

    one.submit("noop from one").await.unwrap();
    two.load_history().await.unwrap();
    assert!(two.history_entries().is_empty());
}

#[tokio::test]
async fn test_clear_history_removes_persisted_copy() {
    let store = Arc::new(MemoryStore::new());
    let session = session_with(store.clone(), "gone", 500);
    session.submit("noop").await.unwrap();

    session.clear_history().await.unwrap();
    assert!(session.history_entries().is_empty());
    assert_eq!(store.get(&history_key("gone")).await.unwrap(), None);
}

#[tokio::test]
async fn test_malformed_history_is_ignored() {
    let store = Arc::new(MemoryStore::new());
    store.set(&history_key("bad"), "not json").await.unwrap();

    let session = session_with(store.clone(), "bad", 500);
    session.load_history().await.unwrap();
    assert!(session.history_entries().is_empty());
}
