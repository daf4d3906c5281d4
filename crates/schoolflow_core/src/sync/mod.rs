//! Local-state/remote-sync reconciliation core.
//!
//! # Responsibility
//! - Track the current identity (`session_tracker`).
//! - Mirror the identity's remote document into local collections
//!   (`document_mirror`).
//! - Route every local edit through optimistic replace + merge write
//!   (`mutation_gateway`).
//! - Compose the three behind one dispatcher (`sync_store`).
//!
//! # Invariants
//! - Single-threaded: all events are handled on the caller's thread by
//!   `SyncStore::pump`.
//! - Concurrent edits to the same field resolve last-write-wins on the
//!   whole field; edits to different fields never clobber each other.

pub mod document_mirror;
pub mod event;
pub mod mutation_gateway;
pub mod provider_spi;
pub mod session_tracker;
pub mod sync_store;
