//! Sync store: session tracking, document mirroring and mutations in one
//! single-threaded dispatcher.
//!
//! # Responsibility
//! - Own injected collaborators and the event queue they report into.
//! - Route identity, snapshot, error and write events to the right component.
//! - Expose read accessors and mutators to the presentation layer.
//!
//! # Invariants
//! - Local collections change only through the mirror (full replace) or the
//!   gateway (one field replace).
//! - Events are handled strictly in arrival order by `pump`.
//! - `shutdown` cancels every listener this store registered.

use crate::config::{ConfigError, StoreConfig};
use crate::model::document::{CollectionChange, LocalCollections};
use crate::model::identity::Identity;
use crate::model::item::{ExamItem, HomeworkItem, StudySession};
use crate::sync::document_mirror::{DocumentMirror, SnapshotOutcome};
use crate::sync::event::{EventQueue, ListenerHandle, SyncEvent};
use crate::sync::mutation_gateway::{
    appended, mapped_by_id, removed_by_id, replaced_by_id, MutationGateway, WriteDispatch,
};
use crate::sync::provider_spi::{DocumentStore, SessionProvider};
use crate::sync::session_tracker::SessionTracker;
use log::{debug, error, info};
use std::sync::Arc;

/// Diagnostic counters; never used for control flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub snapshots_applied: u64,
    pub documents_created: u64,
    pub stale_events_dropped: u64,
    pub subscription_errors: u64,
    pub writes_issued: u64,
    pub writes_failed: u64,
}

pub struct SyncStore {
    documents: Arc<dyn DocumentStore>,
    queue: EventQueue,
    tracker: SessionTracker,
    mirror: DocumentMirror,
    gateway: MutationGateway,
    collections: LocalCollections,
    stats: SyncStats,
    session_listener: Option<ListenerHandle>,
}

impl SyncStore {
    /// Validates `config`, builds a store and registers the identity listener
    /// exactly once.
    ///
    /// Events reported during registration are queued and handled by the
    /// next `pump`.
    ///
    /// # Errors
    /// Returns the validation error before any listener is registered.
    pub fn start(
        config: &StoreConfig,
        sessions: &dyn SessionProvider,
        documents: Arc<dyn DocumentStore>,
    ) -> Result<Self, ConfigError> {
        let config = config.clone().validated().map_err(|err| {
            error!(
                "event=sync_start module=sync status=error error_code=invalid_config error={}",
                err
            );
            err
        })?;
        let queue = EventQueue::new();
        let session_listener = sessions.on_identity_change(queue.sender().identity_sink());
        info!(
            "event=sync_start module=sync status=ok collection={}",
            config.collection
        );

        Ok(Self {
            documents,
            queue,
            tracker: SessionTracker::new(),
            mirror: DocumentMirror::new(config.collection.as_str()),
            gateway: MutationGateway::new(config.collection.as_str()),
            collections: LocalCollections::new(),
            stats: SyncStats::default(),
            session_listener: Some(session_listener),
        })
    }

    /// Handles every queued event, including ones enqueued while handling.
    ///
    /// Returns the number of events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.queue.try_next() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    fn dispatch(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::IdentityChanged(identity) => self.on_identity(identity),
            SyncEvent::Snapshot {
                subscription,
                snapshot,
            } => {
                let outcome = self.mirror.on_snapshot(
                    subscription,
                    snapshot,
                    &mut self.collections,
                    self.documents.as_ref(),
                    &self.queue.sender(),
                );
                match outcome {
                    SnapshotOutcome::Applied => self.stats.snapshots_applied += 1,
                    SnapshotOutcome::CreateRequested => {
                        self.stats.documents_created += 1;
                        self.stats.writes_issued += 1;
                    }
                    SnapshotOutcome::Stale => self.stats.stale_events_dropped += 1,
                }
            }
            SyncEvent::SubscriptionFailed {
                subscription,
                error,
            } => {
                if self.mirror.on_error(subscription, &error) {
                    self.stats.subscription_errors += 1;
                } else {
                    self.stats.stale_events_dropped += 1;
                }
            }
            SyncEvent::WriteSettled { key, fields, result } => match result {
                Ok(()) => debug!(
                    "event=write_settled module=sync status=ok doc={} fields={}",
                    key,
                    fields.join(",")
                ),
                Err(err) => {
                    self.stats.writes_failed += 1;
                    error!(
                        "event=write_settled module=sync status=error doc={} fields={} error_code={} error={}",
                        key,
                        fields.join(","),
                        err.code(),
                        err
                    );
                }
            },
        }
    }

    fn on_identity(&mut self, identity: Option<Identity>) {
        let transition = self.tracker.apply(identity);
        if !transition.requires_resubscribe() {
            debug!("event=identity_change module=sync status=unchanged");
            return;
        }
        info!(
            "event=identity_change module=sync status=ok signed_in={}",
            self.tracker.identity().is_some()
        );
        self.mirror.follow(
            self.tracker.identity(),
            &mut self.collections,
            self.documents.as_ref(),
            &self.queue.sender(),
        );
    }

    /// Cancels the identity listener and the document subscription.
    ///
    /// Idempotent. Local collections keep their current values.
    pub fn shutdown(&mut self) {
        self.mirror.teardown();
        if let Some(listener) = self.session_listener.take() {
            listener.cancel();
            info!("event=sync_shutdown module=sync status=ok");
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.tracker.identity()
    }

    /// True until the session provider has resolved the initial identity.
    pub fn is_resolving(&self) -> bool {
        self.tracker.is_resolving()
    }

    pub fn collections(&self) -> &LocalCollections {
        &self.collections
    }

    pub fn homework(&self) -> &[HomeworkItem] {
        &self.collections.homework
    }

    pub fn exams(&self) -> &[ExamItem] {
        &self.collections.exams
    }

    pub fn sessions(&self) -> &[StudySession] {
        &self.collections.sessions
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn has_live_subscription(&self) -> bool {
        self.mirror.active_subscription().is_some()
    }

    pub fn set_homework(&mut self, items: Vec<HomeworkItem>) -> WriteDispatch {
        self.commit(CollectionChange::Homework(items))
    }

    pub fn set_exams(&mut self, items: Vec<ExamItem>) -> WriteDispatch {
        self.commit(CollectionChange::Exams(items))
    }

    pub fn set_sessions(&mut self, items: Vec<StudySession>) -> WriteDispatch {
        self.commit(CollectionChange::Sessions(items))
    }

    pub fn append_homework(&mut self, item: HomeworkItem) -> WriteDispatch {
        self.set_homework(appended(&self.collections.homework, item))
    }

    /// Appends several homework items in order with a single write.
    pub fn append_homework_batch(&mut self, items: Vec<HomeworkItem>) -> WriteDispatch {
        let mut next = self.collections.homework.clone();
        next.extend(items);
        self.set_homework(next)
    }

    pub fn update_homework(&mut self, item: &HomeworkItem) -> WriteDispatch {
        self.set_homework(replaced_by_id(&self.collections.homework, item))
    }

    pub fn toggle_homework(&mut self, id: &str) -> WriteDispatch {
        self.set_homework(mapped_by_id(
            &self.collections.homework,
            id,
            HomeworkItem::toggled,
        ))
    }

    pub fn remove_homework(&mut self, id: &str) -> WriteDispatch {
        self.set_homework(removed_by_id(&self.collections.homework, id))
    }

    pub fn append_exam(&mut self, item: ExamItem) -> WriteDispatch {
        self.set_exams(appended(&self.collections.exams, item))
    }

    pub fn remove_exam(&mut self, id: &str) -> WriteDispatch {
        self.set_exams(removed_by_id(&self.collections.exams, id))
    }

    pub fn append_session(&mut self, item: StudySession) -> WriteDispatch {
        self.set_sessions(appended(&self.collections.sessions, item))
    }

    pub fn toggle_session(&mut self, id: &str) -> WriteDispatch {
        self.set_sessions(mapped_by_id(
            &self.collections.sessions,
            id,
            StudySession::toggled,
        ))
    }

    pub fn remove_session(&mut self, id: &str) -> WriteDispatch {
        self.set_sessions(removed_by_id(&self.collections.sessions, id))
    }

    fn commit(&mut self, change: CollectionChange) -> WriteDispatch {
        let dispatch = self.gateway.commit(
            change,
            &mut self.collections,
            self.tracker.identity(),
            self.documents.as_ref(),
            &self.queue.sender(),
        );
        if dispatch == WriteDispatch::Sent {
            self.stats.writes_issued += 1;
        }
        dispatch
    }
}

impl Drop for SyncStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
