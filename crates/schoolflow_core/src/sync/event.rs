//! Single-threaded event queue connecting collaborators to the sync store.
//!
//! # Responsibility
//! - Replace raw platform callbacks with typed `SyncEvent` messages.
//! - Hand collaborators narrow sinks that can only emit their own events.
//! - Provide cancellable listener handles for subscriptions.
//!
//! # Invariants
//! - Events are dispatched in the order they were sent.
//! - Every snapshot/error event carries the subscription id it belongs to.
//! - A `ListenerHandle` runs its cancel action at most once.

use crate::model::document::{DocKey, DocumentSnapshot};
use crate::model::identity::Identity;
use crate::sync::provider_spi::StoreError;
use log::debug;
use std::fmt::{Debug, Formatter};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

/// Identifier the mirror assigns to each document subscription it opens.
pub type SubscriptionId = u64;

/// Message delivered to the sync store's dispatcher.
#[derive(Debug)]
pub enum SyncEvent {
    /// Session provider resolved or changed the current identity.
    IdentityChanged(Option<Identity>),
    /// Document store pushed a snapshot for one subscription.
    Snapshot {
        subscription: SubscriptionId,
        snapshot: DocumentSnapshot,
    },
    /// Document store reported a subscription-level failure.
    SubscriptionFailed {
        subscription: SubscriptionId,
        error: StoreError,
    },
    /// A merge write finished, successfully or not.
    WriteSettled {
        key: DocKey,
        fields: Vec<String>,
        result: Result<(), StoreError>,
    },
}

/// Cloneable sending half of the dispatcher queue.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<SyncEvent>,
}

impl EventSender {
    fn send(&self, event: SyncEvent) {
        if let Err(err) = self.tx.send(event) {
            debug!(
                "event=event_dropped module=sync status=skipped reason=dispatcher_closed kind={}",
                event_kind(&err.0)
            );
        }
    }

    pub fn identity_sink(&self) -> IdentitySink {
        IdentitySink { tx: self.clone() }
    }

    pub fn snapshot_sink(&self, subscription: SubscriptionId) -> SnapshotSink {
        SnapshotSink {
            subscription,
            tx: self.clone(),
        }
    }

    pub fn write_ack(&self, key: DocKey, fields: Vec<String>) -> WriteAck {
        WriteAck {
            key,
            fields,
            tx: self.clone(),
        }
    }
}

/// Owning queue: receiving half plus a sender factory.
pub struct EventQueue {
    tx: Sender<SyncEvent>,
    rx: Receiver<SyncEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Pops the next pending event without blocking.
    pub fn try_next(&self) -> Option<SyncEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            // The queue keeps its own sender, so `Disconnected` cannot happen.
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drains every pending event in arrival order.
    pub fn drain(&self) -> Vec<SyncEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink handed to a session provider.
#[derive(Clone)]
pub struct IdentitySink {
    tx: EventSender,
}

impl IdentitySink {
    pub fn notify(&self, identity: Option<Identity>) {
        self.tx.send(SyncEvent::IdentityChanged(identity));
    }
}

/// Sink handed to a document store for one subscription.
#[derive(Clone)]
pub struct SnapshotSink {
    subscription: SubscriptionId,
    tx: EventSender,
}

impl SnapshotSink {
    pub fn deliver(&self, snapshot: DocumentSnapshot) {
        self.tx.send(SyncEvent::Snapshot {
            subscription: self.subscription,
            snapshot,
        });
    }

    pub fn fail(&self, error: StoreError) {
        self.tx.send(SyncEvent::SubscriptionFailed {
            subscription: self.subscription,
            error,
        });
    }
}

/// One-shot completion for a merge write.
pub struct WriteAck {
    key: DocKey,
    fields: Vec<String>,
    tx: EventSender,
}

impl WriteAck {
    pub fn settle(self, result: Result<(), StoreError>) {
        self.tx.send(SyncEvent::WriteSettled {
            key: self.key,
            fields: self.fields,
            result,
        });
    }
}

/// Handle returned by `subscribe`-style calls; cancelling unsubscribes.
///
/// Dropping an active handle cancels it as well.
pub struct ListenerHandle {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl ListenerHandle {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl Debug for ListenerHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

fn event_kind(event: &SyncEvent) -> &'static str {
    match event {
        SyncEvent::IdentityChanged(_) => "identity_changed",
        SyncEvent::Snapshot { .. } => "snapshot",
        SyncEvent::SubscriptionFailed { .. } => "subscription_failed",
        SyncEvent::WriteSettled { .. } => "write_settled",
    }
}

#[cfg(test)]
mod tests {
    use super::{EventQueue, ListenerHandle, SyncEvent};
    use crate::model::document::DocumentSnapshot;
    use crate::model::identity::Identity;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn queue_preserves_send_order_across_sinks() {
        let queue = EventQueue::new();
        let sender = queue.sender();
        sender.identity_sink().notify(Some(Identity::new("u1")));
        sender.snapshot_sink(7).deliver(DocumentSnapshot::missing());

        let events = queue.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SyncEvent::IdentityChanged(Some(_))));
        assert!(matches!(
            events[1],
            SyncEvent::Snapshot { subscription: 7, .. }
        ));
        assert!(queue.try_next().is_none());
    }

    #[test]
    fn listener_handle_cancels_once_on_explicit_cancel_or_drop() {
        let calls = Rc::new(Cell::new(0));

        let counter = Rc::clone(&calls);
        let handle = ListenerHandle::new(move || counter.set(counter.get() + 1));
        handle.cancel();
        assert_eq!(calls.get(), 1);

        let counter = Rc::clone(&calls);
        drop(ListenerHandle::new(move || counter.set(counter.get() + 1)));
        assert_eq!(calls.get(), 2);
    }
}
