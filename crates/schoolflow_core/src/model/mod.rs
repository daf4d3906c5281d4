//! Planner domain model.
//!
//! # Responsibility
//! - Define item records (homework, exams, study sessions) and identity.
//! - Define the remote document shape and its local collection mirror.
//!
//! # Invariants
//! - Every item carries a client-generated id, unique within its collection.
//! - Deletion is expressed by omission from a collection, never by tombstones.

pub mod document;
pub mod identity;
pub mod item;
