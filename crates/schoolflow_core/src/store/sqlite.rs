//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist one JSON document per `(collection, doc_id)`.
//! - Apply merge writes transactionally and push snapshots to subscribers.
//!
//! # Invariants
//! - Stored bodies are JSON objects; anything else is reported, not masked.
//! - A merge write is read-modify-write inside one transaction.
//! - Subscribers are notified only after the transaction commits.

use crate::db::{open_db, open_db_in_memory, DbError, DbResult};
use crate::model::document::{DocKey, DocumentData, DocumentPatch, DocumentSnapshot};
use crate::sync::event::{ListenerHandle, SnapshotSink, WriteAck};
use crate::sync::provider_spi::{DocumentStore, StoreError};
use log::{debug, error};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Backend(value.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Backend(value.to_string())
    }
}

#[derive(Default)]
struct Listeners {
    by_id: BTreeMap<u64, (DocKey, SnapshotSink)>,
    last_id: u64,
}

impl Listeners {
    fn notify(&self, key: &DocKey, snapshot: &DocumentSnapshot) {
        for (listener_key, sink) in self.by_id.values() {
            if listener_key == key {
                sink.deliver(snapshot.clone());
            }
        }
    }
}

pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    listeners: Arc<Mutex<Listeners>>,
}

impl SqliteDocumentStore {
    /// Wraps a connection that already has migrations applied.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        open_db(path).map(Self::new)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        open_db_in_memory().map(Self::new)
    }

    /// Reads one document body, if present.
    pub fn load(&self, key: &DocKey) -> Result<Option<DocumentData>, StoreError> {
        let conn = self.conn();
        read_body(&conn, key)
    }

    fn merge(&self, key: &DocKey, patch: &DocumentPatch) -> Result<DocumentData, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut document = read_body(&tx, key)?.unwrap_or_default();
        patch.merge_into(&mut document);
        let body = serde_json::to_string(&document)?;
        tx.execute(
            "INSERT INTO documents (collection, doc_id, body)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, doc_id) DO UPDATE SET
                body = excluded.body,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key.collection.as_str(), key.doc_id.as_str(), body],
        )?;
        tx.commit()?;
        Ok(document)
    }

    fn snapshot(&self, key: &DocKey) -> Result<DocumentSnapshot, StoreError> {
        Ok(match self.load(key)? {
            Some(data) => DocumentSnapshot::present(data),
            None => DocumentSnapshot::missing(),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn subscribe(&self, key: &DocKey, sink: SnapshotSink) -> ListenerHandle {
        match self.snapshot(key) {
            Ok(snapshot) => sink.deliver(snapshot),
            Err(err) => {
                error!(
                    "event=sqlite_subscribe module=store status=error doc={} error_code={} error={}",
                    key,
                    err.code(),
                    err
                );
                sink.fail(err);
            }
        }

        let listener_id = {
            let mut listeners = self.listeners();
            listeners.last_id += 1;
            let listener_id = listeners.last_id;
            listeners.by_id.insert(listener_id, (key.clone(), sink));
            listener_id
        };

        let listeners = Arc::clone(&self.listeners);
        ListenerHandle::new(move || {
            listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .by_id
                .remove(&listener_id);
        })
    }

    fn write_merge(&self, key: &DocKey, patch: DocumentPatch, ack: WriteAck) {
        match self.merge(key, &patch) {
            Ok(document) => {
                debug!(
                    "event=sqlite_write module=store status=ok doc={} fields={}",
                    key,
                    patch.field_names().join(",")
                );
                self.listeners()
                    .notify(key, &DocumentSnapshot::present(document));
                ack.settle(Ok(()));
            }
            Err(err) => {
                error!(
                    "event=sqlite_write module=store status=error doc={} error_code={} error={}",
                    key,
                    err.code(),
                    err
                );
                ack.settle(Err(err));
            }
        }
    }
}

fn read_body(conn: &Connection, key: &DocKey) -> Result<Option<DocumentData>, StoreError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND doc_id = ?2;",
            params![key.collection.as_str(), key.doc_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    match body {
        None => Ok(None),
        Some(raw) => match serde_json::from_str::<Value>(&raw)? {
            Value::Object(data) => Ok(Some(data)),
            other => Err(StoreError::Encoding(format!(
                "document {key} body is not an object: {}",
                json_kind(&other)
            ))),
        },
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
