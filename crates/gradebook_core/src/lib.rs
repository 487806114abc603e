//! Core domain logic for the student gradebook.
//! This crate is the single source of truth for grading invariants.

pub mod config;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use config::{ConfigError, GradebookConfig, StorageBackend};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::student::{
    calculate_average, canonical_subject, title_case, Gradebook, GradebookDataError,
    RecordIntegrityError, StudentKey, StudentRecord,
};
pub use model::validation::{Field, FieldBounds, GradePolicy, ValidationError};
pub use service::gradebook_service::{
    EditReport, EntryError, EntryIssue, GradebookService, NotFoundError, ScoreEntry,
    ServiceError, ServiceResult, StudentListing, StudentSnapshot, SubjectEdit, UpsertReport,
};
pub use store::json_store::JsonFileStore;
pub use store::record_store::{MemoryRecordStore, RecordStore, StoreError, StoreResult};
pub use store::sqlite_store::SqliteRecordStore;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
