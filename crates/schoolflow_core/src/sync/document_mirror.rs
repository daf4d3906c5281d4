//! Mirrors one identity's remote document into local collections.
//!
//! # Responsibility
//! - Own the single live document subscription.
//! - Replace local collections on every snapshot of that subscription.
//! - Lazily create the document with empty defaults when it is missing.
//!
//! # Invariants
//! - At most one subscription is live; switching identities cancels the old
//!   one before the new one is opened.
//! - Events tagged with a non-live subscription id never touch local state.
//! - Subscription errors keep the last known local collections.

use crate::model::document::{DocKey, DocumentPatch, DocumentSnapshot, LocalCollections};
use crate::model::identity::Identity;
use crate::sync::event::{EventSender, ListenerHandle, SubscriptionId};
use crate::sync::provider_spi::{DocumentStore, StoreError};
use log::{debug, info, warn};

/// Result of handling one snapshot event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Local collections were replaced from the snapshot.
    Applied,
    /// Document was missing; a create-merge was issued.
    CreateRequested,
    /// Snapshot belonged to a cancelled subscription and was dropped.
    Stale,
}

#[derive(Debug)]
struct ActiveSubscription {
    id: SubscriptionId,
    key: DocKey,
    handle: ListenerHandle,
}

#[derive(Debug)]
pub struct DocumentMirror {
    collection: String,
    active: Option<ActiveSubscription>,
    last_subscription_id: SubscriptionId,
}

impl DocumentMirror {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            active: None,
            last_subscription_id: 0,
        }
    }

    /// Document key used for `identity`.
    pub fn key_for(&self, identity: &Identity) -> DocKey {
        DocKey::new(self.collection.as_str(), identity.uid.as_str())
    }

    pub fn active_key(&self) -> Option<&DocKey> {
        self.active.as_ref().map(|active| &active.key)
    }

    pub fn active_subscription(&self) -> Option<SubscriptionId> {
        self.active.as_ref().map(|active| active.id)
    }

    /// Reacts to an identity transition.
    ///
    /// Always tears down the previous subscription and clears local state;
    /// opens a fresh subscription when `identity` is present.
    pub fn follow(
        &mut self,
        identity: Option<&Identity>,
        collections: &mut LocalCollections,
        store: &dyn DocumentStore,
        events: &EventSender,
    ) {
        self.teardown();
        collections.clear();

        let Some(identity) = identity else {
            info!("event=mirror_follow module=sync status=signed_out");
            return;
        };

        self.last_subscription_id += 1;
        let id = self.last_subscription_id;
        let key = self.key_for(identity);
        let handle = store.subscribe(&key, events.snapshot_sink(id));
        info!(
            "event=mirror_follow module=sync status=subscribed uid={} subscription={}",
            identity.uid, id
        );
        self.active = Some(ActiveSubscription { id, key, handle });
    }

    /// Applies a snapshot if it belongs to the live subscription.
    pub fn on_snapshot(
        &self,
        subscription: SubscriptionId,
        snapshot: DocumentSnapshot,
        collections: &mut LocalCollections,
        store: &dyn DocumentStore,
        events: &EventSender,
    ) -> SnapshotOutcome {
        let Some(active) = self.live(subscription) else {
            debug!(
                "event=snapshot_apply module=sync status=stale subscription={}",
                subscription
            );
            return SnapshotOutcome::Stale;
        };

        if !snapshot.exists {
            let patch = DocumentPatch::empty_defaults();
            let fields = patch
                .field_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            info!(
                "event=document_create module=sync status=start doc={}",
                active.key
            );
            store.write_merge(&active.key, patch, events.write_ack(active.key.clone(), fields));
            return SnapshotOutcome::CreateRequested;
        }

        // An existing document without a body reads as three empty fields.
        *collections = LocalCollections::from_document(&snapshot.data.unwrap_or_default());
        debug!(
            "event=snapshot_apply module=sync status=ok doc={} homework={} exams={} sessions={}",
            active.key,
            collections.homework.len(),
            collections.exams.len(),
            collections.sessions.len()
        );
        SnapshotOutcome::Applied
    }

    /// Logs a subscription error; returns `false` when the error is stale.
    pub fn on_error(&self, subscription: SubscriptionId, error: &StoreError) -> bool {
        match self.live(subscription) {
            Some(active) => {
                warn!(
                    "event=subscription_error module=sync status=error doc={} error_code={} error={}",
                    active.key,
                    error.code(),
                    error
                );
                true
            }
            None => {
                debug!(
                    "event=subscription_error module=sync status=stale subscription={} error_code={}",
                    subscription,
                    error.code()
                );
                false
            }
        }
    }

    /// Cancels the live subscription, if any.
    pub fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(
                "event=mirror_teardown module=sync status=ok doc={} subscription={}",
                active.key, active.id
            );
            active.handle.cancel();
        }
    }

    fn live(&self, subscription: SubscriptionId) -> Option<&ActiveSubscription> {
        self.active
            .as_ref()
            .filter(|active| active.id == subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentMirror, SnapshotOutcome};
    use crate::model::document::{DocumentPatch, DocumentSnapshot, LocalCollections};
    use crate::model::identity::Identity;
    use crate::store::memory::MemoryDocumentStore;
    use crate::sync::event::EventQueue;
    use serde_json::json;

    #[test]
    fn snapshot_for_replaced_subscription_is_stale() {
        let store = MemoryDocumentStore::new();
        let queue = EventQueue::new();
        let mut mirror = DocumentMirror::new("users");
        let mut collections = LocalCollections::new();

        mirror.follow(Some(&Identity::new("a")), &mut collections, &store, &queue.sender());
        let first = mirror.active_subscription().expect("live subscription");
        mirror.follow(Some(&Identity::new("b")), &mut collections, &store, &queue.sender());

        let data = json!({"exams": [{"id": "x", "subject": "Chemie", "topic": "", "date": "2024-06-01"}]})
            .as_object()
            .cloned()
            .expect("object");
        let outcome = mirror.on_snapshot(
            first,
            DocumentSnapshot::present(data),
            &mut collections,
            &store,
            &queue.sender(),
        );
        assert_eq!(outcome, SnapshotOutcome::Stale);
        assert!(collections.is_empty());
    }

    #[test]
    fn missing_document_requests_create_without_touching_collections() {
        let store = MemoryDocumentStore::new();
        let queue = EventQueue::new();
        let mut mirror = DocumentMirror::new("users");
        let mut collections = LocalCollections::new();
        let identity = Identity::new("u1");

        mirror.follow(Some(&identity), &mut collections, &store, &queue.sender());
        let live = mirror.active_subscription().expect("live subscription");
        let outcome = mirror.on_snapshot(
            live,
            DocumentSnapshot::missing(),
            &mut collections,
            &store,
            &queue.sender(),
        );

        assert_eq!(outcome, SnapshotOutcome::CreateRequested);
        assert!(collections.is_empty());
        let pending = store.pending_writes();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].1, DocumentPatch::empty_defaults());
    }

    #[test]
    fn existing_document_without_body_applies_empty_and_writes_nothing() {
        let store = MemoryDocumentStore::new();
        let queue = EventQueue::new();
        let mut mirror = DocumentMirror::new("users");
        let identity = Identity::new("u1");
        let mut collections = LocalCollections::new();

        mirror.follow(Some(&identity), &mut collections, &store, &queue.sender());
        let live = mirror.active_subscription().expect("live subscription");
        let earlier = json!({"homework": [{"id": "1", "subject": "Mathe", "dueDate": "2024-01-10"}]});
        collections = LocalCollections::from_document(earlier.as_object().expect("object"));
        assert_eq!(collections.homework.len(), 1);
        let outcome = mirror.on_snapshot(
            live,
            DocumentSnapshot {
                exists: true,
                data: None,
            },
            &mut collections,
            &store,
            &queue.sender(),
        );

        assert_eq!(outcome, SnapshotOutcome::Applied);
        assert!(collections.is_empty());
        assert!(store.pending_writes().is_empty());
    }

    #[test]
    fn following_none_tears_down_and_clears() {
        let store = MemoryDocumentStore::new();
        let queue = EventQueue::new();
        let mut mirror = DocumentMirror::new("users");
        let mut collections = LocalCollections::new();
        let identity = Identity::new("u1");

        mirror.follow(Some(&identity), &mut collections, &store, &queue.sender());
        assert_eq!(store.subscriber_count(&mirror.key_for(&identity)), 1);

        mirror.follow(None, &mut collections, &store, &queue.sender());
        assert!(mirror.active_key().is_none());
        assert_eq!(store.subscriber_count(&mirror.key_for(&identity)), 0);
    }
}
