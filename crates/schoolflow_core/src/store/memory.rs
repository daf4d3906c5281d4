//! In-process document store.
//!
//! # Responsibility
//! - Implement `DocumentStore` merge/subscribe semantics without a backend.
//! - Let callers control when writes resolve (`flush`) and inject faults.
//!
//! # Invariants
//! - Writes resolve strictly in submission order.
//! - Every applied write pushes a snapshot to all subscribers of its key,
//!   then settles the write ack.
//! - Cancelled listeners receive nothing further.

use crate::model::document::{DocKey, DocumentData, DocumentPatch, DocumentSnapshot};
use crate::sync::event::{ListenerHandle, SnapshotSink, WriteAck};
use crate::sync::provider_spi::{DocumentStore, StoreError};
use log::debug;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct PendingWrite {
    key: DocKey,
    patch: DocumentPatch,
    ack: WriteAck,
}

#[derive(Default)]
struct Inner {
    documents: BTreeMap<DocKey, DocumentData>,
    listeners: BTreeMap<u64, (DocKey, SnapshotSink)>,
    last_listener_id: u64,
    pending: VecDeque<PendingWrite>,
    auto_flush: bool,
    failing_writes: usize,
}

impl Inner {
    fn snapshot(&self, key: &DocKey) -> DocumentSnapshot {
        match self.documents.get(key) {
            Some(data) => DocumentSnapshot::present(data.clone()),
            None => DocumentSnapshot::missing(),
        }
    }

    fn apply(&mut self, key: &DocKey, patch: &DocumentPatch) {
        let document = self.documents.entry(key.clone()).or_default();
        patch.merge_into(document);
        let snapshot = self.snapshot(key);
        for (listener_key, sink) in self.listeners.values() {
            if listener_key == key {
                sink.deliver(snapshot.clone());
            }
        }
    }
}

/// Shared handle; clones observe the same documents and listeners.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When enabled, writes resolve inside `write_merge` (still via events).
    pub fn set_auto_flush(&self, enabled: bool) {
        self.lock().auto_flush = enabled;
    }

    /// Makes the next `count` resolved writes fail without being applied.
    pub fn fail_next_writes(&self, count: usize) {
        self.lock().failing_writes = count;
    }

    /// Seeds a document without notifying subscribers.
    pub fn insert_document(&self, key: DocKey, data: DocumentData) {
        self.lock().documents.insert(key, data);
    }

    pub fn document(&self, key: &DocKey) -> Option<DocumentData> {
        self.lock().documents.get(key).cloned()
    }

    pub fn subscriber_count(&self, key: &DocKey) -> usize {
        self.lock()
            .listeners
            .values()
            .filter(|(listener_key, _)| listener_key == key)
            .count()
    }

    /// Writes queued and not yet resolved, in submission order.
    pub fn pending_writes(&self) -> Vec<(DocKey, DocumentPatch)> {
        self.lock()
            .pending
            .iter()
            .map(|write| (write.key.clone(), write.patch.clone()))
            .collect()
    }

    /// Resolves every queued write; returns how many were resolved.
    pub fn flush(&self) -> usize {
        let mut inner = self.lock();
        let mut resolved = 0;
        while let Some(write) = inner.pending.pop_front() {
            resolved += 1;
            if inner.failing_writes > 0 {
                inner.failing_writes -= 1;
                debug!(
                    "event=memory_write module=store status=error doc={} error_code=injected",
                    write.key
                );
                write.ack.settle(Err(StoreError::Unavailable(
                    "injected write failure".to_string(),
                )));
                continue;
            }
            inner.apply(&write.key, &write.patch);
            write.ack.settle(Ok(()));
        }
        resolved
    }

    /// Applies a merge as if another device wrote it.
    pub fn external_write(&self, key: &DocKey, patch: &DocumentPatch) {
        self.lock().apply(key, patch);
    }

    /// Reports a subscription failure to every listener of `key`.
    pub fn emit_subscription_error(&self, key: &DocKey, message: &str) {
        let inner = self.lock();
        for (listener_key, sink) in inner.listeners.values() {
            if listener_key == key {
                sink.fail(StoreError::Unavailable(message.to_string()));
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn subscribe(&self, key: &DocKey, sink: SnapshotSink) -> ListenerHandle {
        let listener_id = {
            let mut inner = self.lock();
            inner.last_listener_id += 1;
            let listener_id = inner.last_listener_id;
            sink.deliver(inner.snapshot(key));
            inner.listeners.insert(listener_id, (key.clone(), sink));
            listener_id
        };

        let inner = Arc::clone(&self.inner);
        ListenerHandle::new(move || {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .remove(&listener_id);
        })
    }

    fn write_merge(&self, key: &DocKey, patch: DocumentPatch, ack: WriteAck) {
        let auto_flush = {
            let mut inner = self.lock();
            inner.pending.push_back(PendingWrite {
                key: key.clone(),
                patch,
                ack,
            });
            inner.auto_flush
        };
        if auto_flush {
            self.flush();
        }
    }
}
