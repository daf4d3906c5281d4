//! In-process session provider.
//!
//! # Invariants
//! - Listeners registered after resolution immediately receive the current
//!   identity; listeners registered before it wait for `resolve`.
//! - Every `resolve`/`sign_in`/`sign_out` notifies all live listeners once.

use crate::model::identity::Identity;
use crate::sync::event::{IdentitySink, ListenerHandle};
use crate::sync::provider_spi::SessionProvider;
use log::info;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Inner {
    /// `None` until first resolution.
    current: Option<Option<Identity>>,
    listeners: BTreeMap<u64, IdentitySink>,
    last_listener_id: u64,
}

/// Shared handle; clones observe the same session state.
#[derive(Clone, Default)]
pub struct MemorySessionProvider {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySessionProvider {
    /// Creates an unresolved provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes the resolved identity (initial resolution or later change).
    pub fn resolve(&self, identity: Option<Identity>) {
        let mut inner = self.lock();
        info!(
            "event=session_resolve module=session status=ok signed_in={} listeners={}",
            identity.is_some(),
            inner.listeners.len()
        );
        for sink in inner.listeners.values() {
            sink.notify(identity.clone());
        }
        inner.current = Some(identity);
    }

    pub fn sign_in(&self, identity: Identity) {
        self.resolve(Some(identity));
    }

    pub fn sign_out(&self) {
        self.resolve(None);
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionProvider for MemorySessionProvider {
    fn on_identity_change(&self, sink: IdentitySink) -> ListenerHandle {
        let listener_id = {
            let mut inner = self.lock();
            inner.last_listener_id += 1;
            let listener_id = inner.last_listener_id;
            if let Some(current) = &inner.current {
                sink.notify(current.clone());
            }
            inner.listeners.insert(listener_id, sink);
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
}

#[cfg(test)]
mod tests {
    use super::MemorySessionProvider;
    use crate::model::identity::Identity;
    use crate::sync::event::{EventQueue, SyncEvent};
    use crate::sync::provider_spi::SessionProvider;

    #[test]
    fn late_listener_receives_current_identity() {
        let provider = MemorySessionProvider::new();
        provider.sign_in(Identity::new("u1"));

        let queue = EventQueue::new();
        let _handle = provider.on_identity_change(queue.sender().identity_sink());
        match queue.try_next() {
            Some(SyncEvent::IdentityChanged(Some(identity))) => assert_eq!(identity.uid, "u1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn early_listener_waits_for_resolution() {
        let provider = MemorySessionProvider::new();
        let queue = EventQueue::new();
        let handle = provider.on_identity_change(queue.sender().identity_sink());
        assert!(queue.try_next().is_none());

        provider.resolve(None);
        assert!(matches!(
            queue.try_next(),
            Some(SyncEvent::IdentityChanged(None))
        ));

        handle.cancel();
        assert_eq!(provider.listener_count(), 0);
    }
}
