//! Collaborator contracts consumed by the sync store.
//!
//! # Responsibility
//! - Describe the session provider and document store as black boxes.
//! - Define the store-side error taxonomy surfaced through events.
//!
//! # Invariants
//! - Implementations report results through sinks, never by blocking.
//! - `write_merge` upserts only the patch's top-level fields and creates the
//!   document when absent.
//! - Cancelling a returned `ListenerHandle` stops further deliveries.

use crate::model::document::{DocKey, DocumentPatch};
use crate::sync::event::{IdentitySink, ListenerHandle, SnapshotSink, WriteAck};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure reported by a document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connectivity loss or backend temporarily unreachable.
    Unavailable(String),
    /// Caller is not allowed to read/write the document.
    PermissionDenied(String),
    /// Document body could not be encoded or decoded.
    Encoding(String),
    /// Any other backend failure.
    Backend(String),
}

impl StoreError {
    /// Stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Encoding(_) => "encoding",
            Self::Backend(_) => "backend",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "document store unavailable: {message}"),
            Self::PermissionDenied(message) => write!(f, "permission denied: {message}"),
            Self::Encoding(message) => write!(f, "document encoding failed: {message}"),
            Self::Backend(message) => write!(f, "document store error: {message}"),
        }
    }
}

impl Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encoding(value.to_string())
    }
}

/// Authentication/session backend.
pub trait SessionProvider {
    /// Registers `sink` for the initial identity resolution and every later
    /// sign-in/sign-out.
    fn on_identity_change(&self, sink: IdentitySink) -> ListenerHandle;
}

/// Realtime per-identity document backend.
pub trait DocumentStore {
    /// Opens a live subscription; `sink` receives the initial snapshot and
    /// every later change, including echoes of this client's writes.
    fn subscribe(&self, key: &DocKey, sink: SnapshotSink) -> ListenerHandle;

    /// Asynchronously merges `patch` into the document at `key`.
    fn write_merge(&self, key: &DocKey, patch: DocumentPatch, ack: WriteAck);
}
