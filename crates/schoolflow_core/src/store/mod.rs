//! Document store implementations.
//!
//! # Responsibility
//! - Provide `DocumentStore` backends with merge-write semantics.
//!
//! # Invariants
//! - A merge write replaces only the patch's top-level fields.
//! - Subscribers of a key observe every applied write to that key.

pub mod memory;
pub mod sqlite;
