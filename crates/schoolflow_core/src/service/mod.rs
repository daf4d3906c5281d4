//! Planner use-case services.
//!
//! # Responsibility
//! - Derive display orderings and dashboard figures from local collections.
//! - Turn assistant replies into planner records via the sync store.
//!
//! # Invariants
//! - Query helpers are read-only; every write goes through `SyncStore`.

pub mod agenda;
pub mod assistant_service;
pub mod dashboard;
