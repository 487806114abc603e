//! Typed validation for user-supplied ages and scores.
//!
//! # Responsibility
//! - Provide one validation function per numeric field, shared by the add
//!   and edit paths.
//!
//! # Invariants
//! - Accepted values always lie in the inclusive `[min, max]` range.
//! - Input is trimmed before parsing; blank input is `Missing`, not zero.

use crate::model::student::StudentRecord;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_AGE_MIN: u32 = 7;
pub const DEFAULT_AGE_MAX: u32 = 18;
pub const DEFAULT_SCORE_MIN: u32 = 0;
pub const DEFAULT_SCORE_MAX: u32 = 100;

/// Field a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Age,
    Score,
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Age => f.write_str("age"),
            Self::Score => f.write_str("score"),
        }
    }
}

/// Rejection reasons for user-supplied record fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Student name is blank after trimming.
    BlankName,
    /// A required numeric value was not supplied.
    Missing { field: Field },
    /// Input is not an integer.
    NotNumeric { field: Field, input: String },
    /// Integer outside the configured inclusive range.
    OutOfRange {
        field: Field,
        value: i64,
        min: u32,
        max: u32,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name cannot be blank"),
            Self::Missing { field } => write!(f, "{field} is required"),
            Self::NotNumeric { field, input } => {
                write!(f, "invalid {field} `{input}`: please enter a number")
            }
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} {value} must be between {min} and {max}"),
        }
    }
}

impl Error for ValidationError {}

/// Inclusive numeric bounds for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldBounds {
    min: u32,
    max: u32,
}

impl FieldBounds {
    /// Returns `None` when `min > max`.
    pub fn new(min: u32, max: u32) -> Option<Self> {
        if min > max {
            return None;
        }
        Some(Self { min, max })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    fn parse(&self, field: Field, raw: &str) -> Result<u32, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Missing { field });
        }
        let value = trimmed
            .parse::<i64>()
            .map_err(|_| ValidationError::NotNumeric {
                field,
                input: trimmed.to_string(),
            })?;
        let out_of_range = ValidationError::OutOfRange {
            field,
            value,
            min: self.min,
            max: self.max,
        };
        match u32::try_from(value) {
            Ok(value) if self.contains(value) => Ok(value),
            _ => Err(out_of_range),
        }
    }
}

/// Age and score bounds applied by the gradebook service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradePolicy {
    pub age: FieldBounds,
    pub score: FieldBounds,
}

impl Default for GradePolicy {
    fn default() -> Self {
        Self {
            age: FieldBounds {
                min: DEFAULT_AGE_MIN,
                max: DEFAULT_AGE_MAX,
            },
            score: FieldBounds {
                min: DEFAULT_SCORE_MIN,
                max: DEFAULT_SCORE_MAX,
            },
        }
    }
}

impl GradePolicy {
    pub fn validate_age(&self, raw: &str) -> Result<u32, ValidationError> {
        self.age.parse(Field::Age, raw)
    }

    pub fn validate_score(&self, raw: &str) -> Result<u32, ValidationError> {
        self.score.parse(Field::Score, raw)
    }

    /// Checks an already-built record against this policy.
    ///
    /// Used on snapshots loaded from storage, which may predate the current
    /// bounds.
    pub fn check_record(&self, record: &StudentRecord) -> Result<(), ValidationError> {
        if !self.age.contains(record.age()) {
            return Err(ValidationError::OutOfRange {
                field: Field::Age,
                value: i64::from(record.age()),
                min: self.age.min,
                max: self.age.max,
            });
        }
        for score in record.subjects().values() {
            if !self.score.contains(*score) {
                return Err(ValidationError::OutOfRange {
                    field: Field::Score,
                    value: i64::from(*score),
                    min: self.score.min,
                    max: self.score.max,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Field, GradePolicy, ValidationError};

    #[test]
    fn parse_trims_surrounding_whitespace() {
        let policy = GradePolicy::default();
        assert_eq!(policy.validate_score(" 42 \n"), Ok(42));
    }

    #[test]
    fn negative_input_reports_range_not_format() {
        let policy = GradePolicy::default();
        assert_eq!(
            policy.validate_score("-1"),
            Err(ValidationError::OutOfRange {
                field: Field::Score,
                value: -1,
                min: 0,
                max: 100,
            })
        );
    }
}
