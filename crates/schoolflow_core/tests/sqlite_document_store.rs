use chrono::NaiveDate;
use schoolflow_core::sync::event::{EventQueue, SyncEvent};
use schoolflow_core::{
    DocKey, DocumentPatch, DocumentStore, ExamItem, Identity, MemorySessionProvider,
    SqliteDocumentStore, StoreConfig, StoreError, SyncStore,
};
use serde_json::json;
use std::sync::Arc;

fn key(uid: &str) -> DocKey {
    DocKey::new("users", uid)
}

fn exam(id: &str) -> ExamItem {
    ExamItem {
        id: id.to_string(),
        subject: "Physik".to_string(),
        topic: "Mechanik".to_string(),
        date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
    }
}

#[test]
fn sync_store_creates_and_persists_document_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("planner.db");

    {
        let documents = Arc::new(SqliteDocumentStore::open(&path).unwrap());
        let sessions = MemorySessionProvider::new();
        let mut store =
            SyncStore::start(&StoreConfig::default(), &sessions, documents.clone()).unwrap();
        sessions.sign_in(Identity::new("u1"));

        // identity, missing snapshot, create echo, create ack
        assert_eq!(store.pump(), 4);
        assert_eq!(store.stats().documents_created, 1);

        store.append_exam(exam("e1"));
        store.pump();
        assert_eq!(store.stats().writes_failed, 0);
        assert_eq!(store.exams().len(), 1);
    }

    let reopened = SqliteDocumentStore::open(&path).unwrap();
    let data = reopened.load(&key("u1")).unwrap().unwrap();
    assert_eq!(data["homework"], json!([]));
    assert_eq!(data["sessions"], json!([]));
    assert_eq!(data["exams"][0]["id"], json!("e1"));
    assert_eq!(data["exams"][0]["date"], json!("2024-06-03"));
}

#[test]
fn merge_write_leaves_other_fields_untouched() {
    let documents = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
    let sessions = MemorySessionProvider::new();
    sessions.sign_in(Identity::new("u1"));
    let mut store =
        SyncStore::start(&StoreConfig::default(), &sessions, documents.clone()).unwrap();
    store.pump();

    store.append_exam(exam("e1"));
    store.set_homework(Vec::new());
    store.pump();

    let data = documents.load(&key("u1")).unwrap().unwrap();
    assert_eq!(data["exams"].as_array().unwrap().len(), 1);
    assert_eq!(data["homework"], json!([]));
    assert_eq!(store.exams(), &[exam("e1")][..]);
}

#[test]
fn other_clients_writes_reach_subscribed_store() {
    let documents = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
    let sessions = MemorySessionProvider::new();
    sessions.sign_in(Identity::new("u1"));
    let mut first =
        SyncStore::start(&StoreConfig::default(), &sessions, documents.clone()).unwrap();
    let mut second =
        SyncStore::start(&StoreConfig::default(), &sessions, documents.clone()).unwrap();
    first.pump();
    second.pump();

    second.append_exam(exam("e9"));
    first.pump();

    assert_eq!(first.exams(), &[exam("e9")][..]);
}

#[test]
fn unknown_document_loads_as_none() {
    let documents = SqliteDocumentStore::open_in_memory().unwrap();
    assert!(documents.load(&key("nobody")).unwrap().is_none());
}

#[test]
fn non_object_body_is_reported_as_encoding_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.db");
    {
        let conn = schoolflow_core::db::open_db(&path).unwrap();
        conn.execute(
            "INSERT INTO documents (collection, doc_id, body) VALUES ('users', 'u1', '[1, 2]');",
            [],
        )
        .unwrap();
    }

    let documents = SqliteDocumentStore::open(&path).unwrap();
    let err = documents.load(&key("u1")).unwrap_err();
    assert!(matches!(err, StoreError::Encoding(_)));
}

#[test]
fn merge_creates_missing_document_with_patch_fields_only() {
    let documents = SqliteDocumentStore::open_in_memory().unwrap();
    let queue = EventQueue::new();

    let mut patch = DocumentPatch::new();
    patch.set("exams", json!([]));
    documents.write_merge(
        &key("u2"),
        patch,
        queue.sender().write_ack(key("u2"), vec!["exams".to_string()]),
    );

    let data = documents.load(&key("u2")).unwrap().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data["exams"], json!([]));
    assert!(matches!(
        queue.try_next(),
        Some(SyncEvent::WriteSettled { result: Ok(()), .. })
    ));
}

#[test]
fn subscription_error_on_corrupt_body_keeps_store_usable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.db");
    {
        let conn = schoolflow_core::db::open_db(&path).unwrap();
        conn.execute(
            "INSERT INTO documents (collection, doc_id, body) VALUES ('users', 'u1', '\"text\"');",
            [],
        )
        .unwrap();
    }

    let documents = Arc::new(SqliteDocumentStore::open(&path).unwrap());
    let sessions = MemorySessionProvider::new();
    sessions.sign_in(Identity::new("u1"));
    let mut store =
        SyncStore::start(&StoreConfig::default(), &sessions, documents.clone()).unwrap();
    store.pump();

    assert_eq!(store.stats().subscription_errors, 1);
    assert!(store.collections().is_empty());
    assert!(store.has_live_subscription());
}

#[test]
fn failed_merge_settles_with_error_and_notifies_no_subscriber() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.db");
    let documents = SqliteDocumentStore::open(&path).unwrap();
    let queue = EventQueue::new();
    let _subscription = documents.subscribe(&key("u1"), queue.sender().snapshot_sink(7));
    assert_eq!(queue.drain().len(), 1);

    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch("DROP TABLE documents;")
        .unwrap();

    let mut patch = DocumentPatch::new();
    patch.set("exams", json!([]));
    documents.write_merge(
        &key("u1"),
        patch,
        queue.sender().write_ack(key("u1"), vec!["exams".to_string()]),
    );

    let events = queue.drain();
    assert_eq!(events.len(), 1);
    match &events[0] {
        SyncEvent::WriteSettled { key: written, result, .. } => {
            assert_eq!(written, &key("u1"));
            assert!(matches!(result, Err(StoreError::Backend(_))));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
