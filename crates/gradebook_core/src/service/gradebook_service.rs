//! Gradebook use-case service.
//!
//! # Responsibility
//! - Own the in-memory gradebook and all validation/normalization rules.
//! - Provide add/update, edit/delete, search and listing entry points.
//! - Persist a full snapshot after every mutating operation.
//!
//! # Invariants
//! - Nothing that fails `GradePolicy` validation reaches the gradebook.
//! - Record-level validation errors (name, age) abort before any mutation.
//! - Subject-level issues are collected and never abort the whole call.
//! - A failed save keeps the in-memory change and marks the service dirty;
//!   `flush` retries it.
//! - After a load failure that left no copy of the stored data, saves are
//!   refused until `allow_overwrite` is called.

use crate::model::student::{canonical_subject, tidy_display, Gradebook, StudentKey, StudentRecord};
use crate::model::validation::{GradePolicy, ValidationError};
use crate::store::record_store::{RecordStore, StoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Lookup misses for students or subjects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundError {
    Student(String),
    Subject { student: String, subject: String },
}

impl Display for NotFoundError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Student(name) => write!(f, "student `{name}` not found"),
            Self::Subject { student, subject } => {
                write!(f, "subject `{subject}` not found for `{student}`")
            }
        }
    }
}

impl Error for NotFoundError {}

/// Service error for gradebook use-cases.
#[derive(Debug)]
pub enum ServiceError {
    Validation(ValidationError),
    NotFound(NotFoundError),
    /// The in-memory change succeeded but could not be persisted.
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "changes are kept in memory but not saved: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::NotFound(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<NotFoundError> for ServiceError {
    fn from(value: NotFoundError) -> Self {
        Self::NotFound(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Non-fatal problem with one subject entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    Validation(ValidationError),
    NotFound(NotFoundError),
}

impl Display for EntryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(err) => write!(f, "{err}"),
        }
    }
}

/// Subject entry that was reported and skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryIssue {
    /// Canonical subject name.
    pub subject: String,
    pub error: EntryError,
}

/// Raw subject/score pair collected by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    pub subject: String,
    pub score: String,
}

impl ScoreEntry {
    pub fn new(subject: impl Into<String>, score: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            score: score.into(),
        }
    }
}

/// Raw edit for one existing subject.
///
/// A missing or blank `score` deletes the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectEdit {
    pub subject: String,
    pub score: Option<String>,
}

impl SubjectEdit {
    pub fn set(subject: impl Into<String>, score: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            score: Some(score.into()),
        }
    }

    pub fn delete(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            score: None,
        }
    }
}

/// Read model returned by search and mutation reports.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentSnapshot {
    pub key: StudentKey,
    pub display_name: String,
    pub record: StudentRecord,
}

impl StudentSnapshot {
    fn capture(key: &StudentKey, record: &StudentRecord) -> Self {
        Self {
            key: key.clone(),
            display_name: Gradebook::display_name_of(key, record),
            record: record.clone(),
        }
    }

    pub fn average(&self) -> f64 {
        self.record.average()
    }
}

/// Listing result; `Empty` is distinct from a populated list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentListing {
    Empty,
    /// Display names in canonical key order.
    Names(Vec<String>),
}

/// Outcome of `add_or_update_student`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertReport {
    pub student: StudentSnapshot,
    /// `true` when this call created the record.
    pub created: bool,
    /// Canonical subjects whose scores were set, in input order.
    pub applied: Vec<String>,
    pub rejected: Vec<EntryIssue>,
}

/// Outcome of `edit_student`.
#[derive(Debug, Clone, PartialEq)]
pub struct EditReport {
    pub student: StudentSnapshot,
    pub age_changed: bool,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
    pub rejected: Vec<EntryIssue>,
}

/// Gradebook service over a snapshot store.
pub struct GradebookService<S: RecordStore> {
    store: S,
    gradebook: Gradebook,
    policy: GradePolicy,
    dirty: bool,
    load_error: Option<StoreError>,
    overwrite_guard: bool,
}

impl<S: RecordStore> GradebookService<S> {
    /// Loads the gradebook once from `store`.
    ///
    /// A load failure is logged and kept for `take_load_error`; the service
    /// then starts from an empty gradebook. Unless the store copied the
    /// unreadable data aside, saving stays blocked (see `allow_overwrite`).
    pub fn open(store: S, policy: GradePolicy) -> Self {
        let (gradebook, load_error) = match store.load() {
            Ok(gradebook) => (gradebook, None),
            Err(err) => {
                warn!(
                    "event=gradebook_open module=service status=degraded reason=load_failed error={}",
                    err
                );
                (Gradebook::new(), Some(err))
            }
        };

        let out_of_policy = gradebook
            .iter()
            .filter(|(_, record)| policy.check_record(record).is_err())
            .count();
        if out_of_policy > 0 {
            warn!(
                "event=gradebook_open module=service status=ok out_of_policy_records={}",
                out_of_policy
            );
        }
        info!(
            "event=gradebook_open module=service status=ok students={} location={}",
            gradebook.len(),
            store.location()
        );

        let overwrite_guard = load_error
            .as_ref()
            .is_some_and(|err| err.backup().is_none());
        if overwrite_guard {
            warn!("event=gradebook_open module=service status=degraded saves=blocked");
        }

        Self {
            store,
            gradebook,
            policy,
            dirty: false,
            load_error,
            overwrite_guard,
        }
    }

    /// Returns the load failure seen by `open`, once.
    pub fn take_load_error(&mut self) -> Option<StoreError> {
        self.load_error.take()
    }

    /// Whether saves are blocked to protect data that failed to load.
    pub fn is_overwrite_guarded(&self) -> bool {
        self.overwrite_guard
    }

    /// Lets later saves replace the data that failed to load.
    pub fn allow_overwrite(&mut self) {
        if self.overwrite_guard {
            info!("event=gradebook_overwrite module=service status=allowed");
        }
        self.overwrite_guard = false;
    }

    pub fn policy(&self) -> &GradePolicy {
        &self.policy
    }

    pub fn gradebook(&self) -> &Gradebook {
        &self.gradebook
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether the in-memory gradebook holds changes not yet saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Case-insensitive existence check; blank names never exist.
    pub fn contains_student(&self, raw_name: &str) -> bool {
        StudentKey::from_raw(raw_name).is_some_and(|key| self.gradebook.contains(&key))
    }

    /// Adds a new student or updates an existing one's subject scores.
    ///
    /// # Contract
    /// - Blank name: `ValidationError::BlankName`, nothing changes.
    /// - Existing student: `raw_age` is ignored.
    /// - New student: `raw_age` must pass `validate_age`, else the call
    ///   aborts with no record created.
    /// - Entries are applied in order until the first blank subject; an
    ///   invalid score is reported in `rejected` and the loop continues.
    /// - Re-adding a subject overwrites its score.
    /// - The full gradebook is saved afterwards.
    pub fn add_or_update_student<I>(
        &mut self,
        raw_name: &str,
        raw_age: Option<&str>,
        entries: I,
    ) -> ServiceResult<UpsertReport>
    where
        I: IntoIterator<Item = ScoreEntry>,
    {
        let key = StudentKey::from_raw(raw_name).ok_or(ValidationError::BlankName)?;
        let created = !self.gradebook.contains(&key);

        if created {
            let age = self.policy.validate_age(raw_age.unwrap_or_default())?;
            let display = tidy_display(raw_name).unwrap_or_else(|| key.to_string());
            self.gradebook
                .insert(key.clone(), StudentRecord::with_display_name(age, display));
        }

        let policy = self.policy;
        let record = self
            .gradebook
            .get_mut(&key)
            .ok_or_else(|| NotFoundError::Student(key.to_string()))?;

        let mut applied = Vec::new();
        let mut rejected = Vec::new();
        for entry in entries {
            let Some(subject) = canonical_subject(&entry.subject) else {
                break;
            };
            match policy.validate_score(&entry.score) {
                Ok(score) => {
                    record.set_score(subject.clone(), score);
                    applied.push(subject);
                }
                Err(err) => rejected.push(EntryIssue {
                    subject,
                    error: EntryError::Validation(err),
                }),
            }
        }

        let student = StudentSnapshot::capture(&key, record);
        self.dirty = true;
        info!(
            "event=student_upsert module=service status=ok created={} applied={} rejected={} count_scores={}",
            created,
            applied.len(),
            rejected.len(),
            student.record.count_scores()
        );
        self.persist()?;

        Ok(UpsertReport {
            student,
            created,
            applied,
            rejected,
        })
    }

    /// Edits an existing student's age and subject scores.
    ///
    /// # Contract
    /// - Unknown student: `NotFoundError::Student`.
    /// - `new_age` absent or blank keeps the current age; an invalid value
    ///   aborts with no mutation so the caller can ask again.
    /// - For each edit until the first blank subject: unknown subject is
    ///   reported; blank score deletes; valid score overwrites; invalid
    ///   score is reported and leaves the subject unchanged.
    /// - Aggregates are recomputed and the gradebook is saved.
    pub fn edit_student<I>(
        &mut self,
        raw_name: &str,
        new_age: Option<&str>,
        edits: I,
    ) -> ServiceResult<EditReport>
    where
        I: IntoIterator<Item = SubjectEdit>,
    {
        let key = StudentKey::from_raw(raw_name).ok_or(ValidationError::BlankName)?;
        if !self.gradebook.contains(&key) {
            return Err(NotFoundError::Student(raw_name.trim().to_string()).into());
        }

        let age = match new_age.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(self.policy.validate_age(raw)?),
            None => None,
        };

        let policy = self.policy;
        let record = self
            .gradebook
            .get_mut(&key)
            .ok_or_else(|| NotFoundError::Student(key.to_string()))?;
        let display_name = Gradebook::display_name_of(&key, record);

        let age_changed = age.is_some_and(|age| age != record.age());
        if let Some(age) = age {
            record.set_age(age);
        }

        let mut updated = Vec::new();
        let mut deleted = Vec::new();
        let mut rejected = Vec::new();
        for edit in edits {
            let Some(subject) = canonical_subject(&edit.subject) else {
                break;
            };
            if record.score(&subject).is_none() {
                rejected.push(EntryIssue {
                    subject: subject.clone(),
                    error: EntryError::NotFound(NotFoundError::Subject {
                        student: display_name.clone(),
                        subject,
                    }),
                });
                continue;
            }

            match edit.score.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
                None => {
                    record.remove_subject(&subject);
                    deleted.push(subject);
                }
                Some(raw) => match policy.validate_score(raw) {
                    Ok(score) => {
                        record.set_score(subject.clone(), score);
                        updated.push(subject);
                    }
                    Err(err) => rejected.push(EntryIssue {
                        subject,
                        error: EntryError::Validation(err),
                    }),
                },
            }
        }

        let student = StudentSnapshot::capture(&key, record);
        self.dirty = true;
        info!(
            "event=student_edit module=service status=ok age_changed={} updated={} deleted={} rejected={} count_scores={}",
            age_changed,
            updated.len(),
            deleted.len(),
            rejected.len(),
            student.record.count_scores()
        );
        self.persist()?;

        Ok(EditReport {
            student,
            age_changed,
            updated,
            deleted,
            rejected,
        })
    }

    /// Case-insensitive exact lookup; no partial matching.
    pub fn search_student(&self, raw_name: &str) -> Option<StudentSnapshot> {
        let key = StudentKey::from_raw(raw_name)?;
        self.gradebook
            .get(&key)
            .map(|record| StudentSnapshot::capture(&key, record))
    }

    /// Display names of every student, in canonical key order.
    pub fn list_students(&self) -> StudentListing {
        if self.gradebook.is_empty() {
            return StudentListing::Empty;
        }
        StudentListing::Names(
            self.gradebook
                .iter()
                .map(|(key, record)| Gradebook::display_name_of(key, record))
                .collect(),
        )
    }

    /// Saves pending changes, if any.
    pub fn flush(&mut self) -> ServiceResult<()> {
        if !self.dirty {
            return Ok(());
        }
        self.persist()
    }

    fn persist(&mut self) -> ServiceResult<()> {
        if self.overwrite_guard {
            warn!("event=gradebook_save module=service status=skipped reason=overwrite_guard");
            return Err(StoreError::OverwriteRefused {
                location: self.store.location(),
            }
            .into());
        }
        match self.store.save(&self.gradebook) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event=gradebook_save module=service status=error location={} error={}",
                    self.store.location(),
                    err
                );
                Err(err.into())
            }
        }
    }
}
