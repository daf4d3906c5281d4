//! The only write path for local collections.
//!
//! # Responsibility
//! - Apply each collection change to local state synchronously.
//! - Persist the changed field with a field-scoped merge write.
//! - Provide sequence helpers for append/toggle/remove/update by id.
//!
//! # Invariants
//! - Local replacement happens before the remote write is issued.
//! - A write names exactly one field; other fields are never sent.
//! - Entries of that field this client could not decode are written back as-is.
//! - Failed writes are not rolled back and not retried.
//! - Helpers preserve item order and never deduplicate ids.

use crate::model::document::{CollectionChange, DocKey, LocalCollections};
use crate::model::identity::Identity;
use crate::model::item::{ExamItem, HomeworkItem, StudySession};
use crate::sync::event::EventSender;
use crate::sync::provider_spi::DocumentStore;
use log::{debug, error};

/// Records addressable by their collection-local id.
pub trait CollectionItem: Clone {
    fn item_id(&self) -> &str;
}

impl CollectionItem for HomeworkItem {
    fn item_id(&self) -> &str {
        &self.id
    }
}

impl CollectionItem for ExamItem {
    fn item_id(&self) -> &str {
        &self.id
    }
}

impl CollectionItem for StudySession {
    fn item_id(&self) -> &str {
        &self.id
    }
}

/// How a committed change reached (or did not reach) the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDispatch {
    /// Merge write handed to the document store.
    Sent,
    /// No identity; change is local-only.
    LocalOnly,
    /// Patch could not be encoded; change is local-only.
    EncodeFailed,
}

#[derive(Debug, Clone)]
pub struct MutationGateway {
    collection: String,
}

impl MutationGateway {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }

    /// Replaces one collection locally, then schedules its merge write.
    pub fn commit(
        &self,
        change: CollectionChange,
        collections: &mut LocalCollections,
        identity: Option<&Identity>,
        store: &dyn DocumentStore,
        events: &EventSender,
    ) -> WriteDispatch {
        let field = change.field();
        let item_count = change.len();

        let Some(identity) = identity else {
            collections.replace(change);
            debug!(
                "event=mutation_commit module=sync status=local_only field={} items={}",
                field, item_count
            );
            return WriteDispatch::LocalOnly;
        };

        let patch = collections.patch_for(&change);
        collections.replace(change);
        let patch = match patch {
            Ok(patch) => patch,
            Err(err) => {
                error!(
                    "event=mutation_commit module=sync status=error field={} error_code=encode_failed error={}",
                    field, err
                );
                return WriteDispatch::EncodeFailed;
            }
        };

        let key = DocKey::new(self.collection.as_str(), identity.uid.as_str());
        debug!(
            "event=mutation_commit module=sync status=write_sent doc={} field={} items={}",
            key, field, item_count
        );
        let ack = events.write_ack(key.clone(), vec![field.as_str().to_string()]);
        store.write_merge(&key, patch, ack);
        WriteDispatch::Sent
    }
}

/// Returns `items` with `item` appended.
pub fn appended<T: CollectionItem>(items: &[T], item: T) -> Vec<T> {
    let mut next = items.to_vec();
    next.push(item);
    next
}

/// Returns `items` with every entry matching `id` transformed by `update`.
pub fn mapped_by_id<T: CollectionItem>(items: &[T], id: &str, update: impl Fn(&T) -> T) -> Vec<T> {
    items
        .iter()
        .map(|item| {
            if item.item_id() == id {
                update(item)
            } else {
                item.clone()
            }
        })
        .collect()
}

/// Returns `items` without entries matching `id`.
pub fn removed_by_id<T: CollectionItem>(items: &[T], id: &str) -> Vec<T> {
    items
        .iter()
        .filter(|item| item.item_id() != id)
        .cloned()
        .collect()
}

/// Returns `items` with entries sharing `replacement`'s id swapped in place.
pub fn replaced_by_id<T: CollectionItem>(items: &[T], replacement: &T) -> Vec<T> {
    mapped_by_id(items, replacement.item_id(), |_| replacement.clone())
}
