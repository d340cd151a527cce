use std::sync::Arc;

use chrono::Utc;

use browser_relay::models::record::{
    ConsoleEntry, ConsoleLevel, DiffCursor, RequestRecord, ResponseRecord,
};
use browser_relay::models::session::{Session, SessionState};
use browser_relay::persistence::console_repo::ConsoleRepo;
use browser_relay::persistence::cursor_repo::CursorRepo;
use browser_relay::persistence::db;
use browser_relay::persistence::record_repo::RecordRepo;
use browser_relay::persistence::session_repo::SessionRepo;
use browser_relay::persistence::SqlitePool;

async fn memory_pool() -> Arc<SqlitePool> {
    Arc::new(db::connect_memory().await.expect("in-memory db must open"))
}

#[tokio::test]
async fn file_backed_connect_creates_parent_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("relay.db");

    let pool = db::connect(&path).await.expect("file db must open");
    assert!(path.exists(), "database file must be created");

    // The schema must be in place on a fresh file.
    let repo = SessionRepo::new(Arc::new(pool));
    repo.create(&Session::new_active("sess-file".to_owned()))
        .await
        .unwrap();
    assert!(repo.get("sess-file").await.unwrap().is_some());
}

#[tokio::test]
async fn session_round_trips_through_sqlite() {
    let repo = SessionRepo::new(memory_pool().await);
    let session = Session::new_active("sess-1".to_owned());
    repo.create(&session).await.unwrap();

    let loaded = repo.get("sess-1").await.unwrap().expect("session exists");
    assert_eq!(loaded.session_id, "sess-1");
    assert_eq!(loaded.state, SessionState::Active);
    assert!(loaded.metadata.is_none());
    // RFC3339 round trip keeps sub-second precision.
    assert_eq!(loaded.created_at, session.created_at);
}

#[tokio::test]
async fn missing_session_is_none() {
    let repo = SessionRepo::new(memory_pool().await);
    assert!(repo.get("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn set_state_moves_sessions_between_listings() {
    let repo = SessionRepo::new(memory_pool().await);
    repo.create(&Session::new_active("a".to_owned())).await.unwrap();
    repo.create(&Session::new_active("b".to_owned())).await.unwrap();

    repo.set_state("a", SessionState::Error).await.unwrap();

    let active = repo.list_by_state(SessionState::Active).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].session_id, "b");

    let errored = repo.list_by_state(SessionState::Error).await.unwrap();
    assert_eq!(errored.len(), 1);
    assert_eq!(errored[0].session_id, "a");
}

#[tokio::test]
async fn touch_activity_advances_the_timestamp() {
    let repo = SessionRepo::new(memory_pool().await);
    let session = Session::new_active("sess-t".to_owned());
    repo.create(&session).await.unwrap();

    repo.touch_activity("sess-t").await.unwrap();

    let loaded = repo.get("sess-t").await.unwrap().expect("session exists");
    assert!(loaded.last_activity >= session.last_activity);
}

#[tokio::test]
async fn request_and_response_persist_by_ref_id() {
    let repo = RecordRepo::new(memory_pool().await);
    let now = Utc::now();
    repo.create_request(&RequestRecord {
        ref_id: "ref-1".to_owned(),
        session_id: "sess-1".to_owned(),
        tool_name: "browser_snapshot".to_owned(),
        params: "{}".to_owned(),
        timestamp: now,
    })
    .await
    .unwrap();
    repo.create_response(&ResponseRecord {
        ref_id: "ref-1".to_owned(),
        success: true,
        result: Some(r#"{"tool":"browser_snapshot"}"#.to_owned()),
        page_snapshot: Some("page text".to_owned()),
        console_logs: None,
        error_message: None,
        timestamp: now,
    })
    .await
    .unwrap();

    let loaded = repo.get_response("ref-1").await.unwrap().expect("response exists");
    assert!(loaded.success);
    assert_eq!(loaded.page_snapshot.as_deref(), Some("page text"));
    assert!(loaded.error_message.is_none());
}

#[tokio::test]
async fn failed_response_keeps_full_error_text() {
    let repo = RecordRepo::new(memory_pool().await);
    let long_error = "boom ".repeat(300);
    repo.create_response(&ResponseRecord {
        ref_id: "ref-err".to_owned(),
        success: false,
        result: None,
        page_snapshot: None,
        console_logs: None,
        error_message: Some(long_error.clone()),
        timestamp: Utc::now(),
    })
    .await
    .unwrap();

    let loaded = repo
        .get_response("ref-err")
        .await
        .unwrap()
        .expect("response exists");
    assert!(!loaded.success);
    // The store is the untruncated side; truncation happens at the API edge.
    assert_eq!(loaded.error_message.as_deref(), Some(long_error.as_str()));
}

#[tokio::test]
async fn missing_response_is_none() {
    let repo = RecordRepo::new(memory_pool().await);
    assert!(repo.get_response("absent").await.unwrap().is_none());
}

#[tokio::test]
async fn console_entries_list_in_order_and_filter_by_level() {
    let repo = ConsoleRepo::new(memory_pool().await);
    let base = Utc::now();
    for (i, (level, message)) in [
        (ConsoleLevel::Info, "first"),
        (ConsoleLevel::Error, "second"),
        (ConsoleLevel::Info, "third"),
    ]
    .into_iter()
    .enumerate()
    {
        repo.append(&ConsoleEntry {
            ref_id: "ref-c".to_owned(),
            level,
            message: message.to_owned(),
            timestamp: base + chrono::Duration::seconds(i64::try_from(i).unwrap()),
            location: None,
        })
        .await
        .unwrap();
    }

    let all = repo.list("ref-c", None).await.unwrap();
    assert_eq!(
        all.iter().map(|e| e.message.as_str()).collect::<Vec<_>>(),
        vec!["first", "second", "third"]
    );

    let errors = repo.list("ref-c", Some(ConsoleLevel::Error)).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "second");
}

#[tokio::test]
async fn cursor_upsert_replaces_and_delete_removes() {
    let repo = CursorRepo::new(memory_pool().await);
    let mut cursor = DiffCursor {
        ref_id: "ref-d".to_owned(),
        cursor_position: 10,
        last_snapshot_hash: "aaaa".to_owned(),
        last_read: Utc::now(),
    };
    repo.upsert(&cursor).await.unwrap();

    cursor.cursor_position = 42;
    cursor.last_snapshot_hash = "bbbb".to_owned();
    repo.upsert(&cursor).await.unwrap();

    let loaded = repo.get("ref-d").await.unwrap().expect("cursor exists");
    assert_eq!(loaded.cursor_position, 42);
    assert_eq!(loaded.last_snapshot_hash, "bbbb");

    repo.delete("ref-d").await.unwrap();
    assert!(repo.get("ref-d").await.unwrap().is_none());

    // Deleting an absent cursor is a no-op, not an error.
    repo.delete("ref-d").await.unwrap();
}
