//! Core sync logic for the SchoolFlow planner.
//! Mirrors one remote document per signed-in student into local homework,
//! exam and study-session collections, and persists every edit as a
//! field-scoped merge write.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod session;
pub mod store;
pub mod sync;

pub use config::{ConfigError, StoreConfig, DEFAULT_COLLECTION};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::document::{
    CollectionChange, CollectionField, DocKey, DocumentData, DocumentPatch, DocumentSnapshot,
    LocalCollections,
};
pub use model::identity::Identity;
pub use model::item::{
    new_item_id, ExamItem, HomeworkItem, ItemId, ItemValidationError, Priority, StudySession,
};
pub use service::agenda::{days_until, is_urgent, sort_exams_by_date, sort_homework, HomeworkSort};
pub use service::assistant_service::{
    AssistantAction, AssistantError, AssistantReply, AssistantService, TextExtractor,
};
pub use service::dashboard::{DashboardSummary, NextExam};
pub use session::memory::MemorySessionProvider;
pub use store::memory::MemoryDocumentStore;
pub use store::sqlite::SqliteDocumentStore;
pub use sync::event::{IdentitySink, ListenerHandle, SnapshotSink, WriteAck};
pub use sync::mutation_gateway::WriteDispatch;
pub use sync::provider_spi::{DocumentStore, SessionProvider, StoreError};
pub use sync::sync_store::{SyncStats, SyncStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
