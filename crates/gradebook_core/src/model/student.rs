//! Student record and gradebook domain model.
//!
//! # Responsibility
//! - Define the canonical per-student record persisted by every store backend.
//! - Own the single canonicalization routine for student and subject names.
//! - Keep derived aggregates consistent with the subject map.
//!
//! # Invariants
//! - `total_score == sum(subjects)` and `count_scores == len(subjects)` after
//!   every mutation; both are only written by `recalculate_aggregates`.
//! - Map keys are canonical: trimmed, whitespace-collapsed, lower-cased.
//! - Deserialization rejects records whose stored aggregates disagree with
//!   their subjects instead of silently repairing them. The one exception is
//!   legacy subject names that differ only in case: those are merged and the
//!   aggregates recomputed.

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Canonical, case-insensitive student identity.
///
/// The inner value is always the output of [`canonicalize`], so equality on
/// keys is the case-insensitive name comparison.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StudentKey(String);

impl StudentKey {
    /// Builds a key from raw user input.
    ///
    /// Returns `None` when the input is blank after trimming.
    pub fn from_raw(raw: &str) -> Option<Self> {
        canonicalize(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for StudentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical subject name used as the `subjects` map key.
pub fn canonical_subject(raw: &str) -> Option<String> {
    canonicalize(raw)
}

/// Trims and collapses whitespace runs, keeping the original casing.
///
/// Used for the display form of a student name.
pub fn tidy_display(raw: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

/// Upper-cases the first letter of every word, lower-cases the rest.
///
/// Display fallback for keys that carry no stored display name.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous_is_alpha = false;
    for ch in value.chars() {
        if previous_is_alpha {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        previous_is_alpha = ch.is_alphabetic();
    }
    out
}

fn canonicalize(raw: &str) -> Option<String> {
    tidy_display(raw).map(|value| value.to_lowercase())
}

/// Integrity failures detected when rebuilding a record from persisted parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordIntegrityError {
    /// A subject name is blank after canonicalization.
    BlankSubject,
    /// Stored `total_score` differs from the sum of `subjects`.
    TotalMismatch { stored: u64, computed: u64 },
    /// Stored `count_scores` differs from the number of `subjects`.
    CountMismatch { stored: usize, computed: usize },
}

impl Display for RecordIntegrityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankSubject => write!(f, "subject name cannot be blank"),
            Self::TotalMismatch { stored, computed } => write!(
                f,
                "total_score ({stored}) does not match sum of subjects ({computed})"
            ),
            Self::CountMismatch { stored, computed } => write!(
                f,
                "count_scores ({stored}) does not match number of subjects ({computed})"
            ),
        }
    }
}

impl Error for RecordIntegrityError {}

/// Canonical per-student record.
///
/// Field order mirrors the persisted snapshot shape; `display_name` is only
/// written when known so snapshots without it round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StudentRecordWire")]
pub struct StudentRecord {
    age: u32,
    subjects: BTreeMap<String, u32>,
    total_score: u64,
    count_scores: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct StudentRecordWire {
    age: u32,
    #[serde(default)]
    subjects: BTreeMap<String, u32>,
    total_score: u64,
    count_scores: usize,
    #[serde(default)]
    display_name: Option<String>,
}

impl TryFrom<StudentRecordWire> for StudentRecord {
    type Error = RecordIntegrityError;

    fn try_from(wire: StudentRecordWire) -> Result<Self, Self::Error> {
        Self::restore(
            wire.display_name,
            wire.age,
            wire.subjects,
            wire.total_score,
            wire.count_scores,
        )
    }
}

impl StudentRecord {
    /// Creates an empty record: no subjects, zero aggregates.
    pub fn new(age: u32) -> Self {
        Self {
            age,
            subjects: BTreeMap::new(),
            total_score: 0,
            count_scores: 0,
            display_name: None,
        }
    }

    /// Creates an empty record carrying the original casing of the name.
    pub fn with_display_name(age: u32, display_name: impl Into<String>) -> Self {
        let mut record = Self::new(age);
        record.display_name = tidy_display(&display_name.into());
        record
    }

    /// Rebuilds a record from persisted parts.
    ///
    /// Subject names are canonicalized; stored aggregates must agree with the
    /// subject map. Names that collapse onto one canonical subject are merged,
    /// the later entry winning, and the stored aggregates are then ignored
    /// since they counted every spelling.
    ///
    /// # Errors
    /// - Blank subject names.
    /// - `total_score` / `count_scores` inconsistent with `subjects`.
    pub fn restore(
        display_name: Option<String>,
        age: u32,
        subjects: impl IntoIterator<Item = (String, u32)>,
        total_score: u64,
        count_scores: usize,
    ) -> Result<Self, RecordIntegrityError> {
        let mut canonical = BTreeMap::new();
        let mut merged = 0usize;
        for (subject, score) in subjects {
            let key = canonical_subject(&subject).ok_or(RecordIntegrityError::BlankSubject)?;
            if canonical.insert(key, score).is_some() {
                merged += 1;
            }
        }

        let mut record = Self {
            age,
            subjects: canonical,
            total_score: 0,
            count_scores: 0,
            display_name: display_name.as_deref().and_then(tidy_display),
        };
        record.recalculate_aggregates();

        if merged > 0 {
            warn!(
                "event=record_restore module=model status=repaired merged_subjects={}",
                merged
            );
            return Ok(record);
        }
        if record.total_score != total_score {
            return Err(RecordIntegrityError::TotalMismatch {
                stored: total_score,
                computed: record.total_score,
            });
        }
        if record.count_scores != count_scores {
            return Err(RecordIntegrityError::CountMismatch {
                stored: count_scores,
                computed: record.count_scores,
            });
        }
        Ok(record)
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    /// Callers validate `age` against the active `GradePolicy` first.
    pub(crate) fn set_age(&mut self, age: u32) {
        self.age = age;
    }

    pub fn subjects(&self) -> &BTreeMap<String, u32> {
        &self.subjects
    }

    pub fn score(&self, subject: &str) -> Option<u32> {
        self.subjects.get(subject).copied()
    }

    pub fn total_score(&self) -> u64 {
        self.total_score
    }

    pub fn count_scores(&self) -> usize {
        self.count_scores
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Sets or overwrites one subject score and refreshes aggregates.
    ///
    /// Returns the previous score when the subject already existed.
    pub fn set_score(&mut self, subject: impl Into<String>, score: u32) -> Option<u32> {
        let previous = self.subjects.insert(subject.into(), score);
        self.recalculate_aggregates();
        previous
    }

    /// Removes one subject and refreshes aggregates.
    pub fn remove_subject(&mut self, subject: &str) -> Option<u32> {
        let removed = self.subjects.remove(subject);
        self.recalculate_aggregates();
        removed
    }

    /// Mean score, or `0.0` when the record has no subjects.
    pub fn average(&self) -> f64 {
        calculate_average(self)
    }

    fn recalculate_aggregates(&mut self) {
        self.total_score = self.subjects.values().map(|score| u64::from(*score)).sum();
        self.count_scores = self.subjects.len();
    }
}

/// Mean score of a record; `0.0` when it holds no subjects.
///
/// No rounding is applied here.
pub fn calculate_average(record: &StudentRecord) -> f64 {
    if record.count_scores == 0 {
        return 0.0;
    }
    record.total_score as f64 / record.count_scores as f64
}

/// Failures when building a gradebook from raw persisted entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradebookDataError {
    /// A student key is blank after canonicalization.
    BlankKey,
    /// Two stored keys collapse onto the same canonical key.
    DuplicateKey(StudentKey),
}

impl Display for GradebookDataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankKey => write!(f, "student key cannot be blank"),
            Self::DuplicateKey(key) => {
                write!(f, "student key `{key}` appears more than once")
            }
        }
    }
}

impl Error for GradebookDataError {}

/// Mapping of canonical student key to record.
///
/// Serialized as a plain object keyed by canonical name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gradebook {
    students: BTreeMap<StudentKey, StudentRecord>,
}

impl Gradebook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a gradebook from raw `(key, record)` pairs.
    ///
    /// Keys are canonicalized. A key that was not already canonical keeps its
    /// original form as the display name when the record has none.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, StudentRecord)>,
    ) -> Result<Self, GradebookDataError> {
        let mut students = BTreeMap::new();
        for (raw_key, mut record) in entries {
            let key = StudentKey::from_raw(&raw_key).ok_or(GradebookDataError::BlankKey)?;
            if record.display_name.is_none() && key.as_str() != raw_key {
                record.display_name = tidy_display(&raw_key);
            }
            if students.contains_key(&key) {
                return Err(GradebookDataError::DuplicateKey(key));
            }
            students.insert(key, record);
        }
        Ok(Self { students })
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn contains(&self, key: &StudentKey) -> bool {
        self.students.contains_key(key)
    }

    pub fn get(&self, key: &StudentKey) -> Option<&StudentRecord> {
        self.students.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &StudentKey) -> Option<&mut StudentRecord> {
        self.students.get_mut(key)
    }

    /// Inserts or replaces one record.
    pub fn insert(&mut self, key: StudentKey, record: StudentRecord) -> Option<StudentRecord> {
        self.students.insert(key, record)
    }

    /// Iterates records in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&StudentKey, &StudentRecord)> {
        self.students.iter()
    }

    /// Display form for one record: stored casing, or the key title-cased.
    pub fn display_name_of(key: &StudentKey, record: &StudentRecord) -> String {
        record
            .display_name()
            .map(str::to_string)
            .unwrap_or_else(|| title_case(key.as_str()))
    }
}

impl Serialize for Gradebook {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.students.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Gradebook {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, StudentRecord>::deserialize(deserializer)?;
        Self::from_entries(raw).map_err(D::Error::custom)
    }
}
