//! Gradebook domain model.
//!
//! # Responsibility
//! - Define the canonical student record and the gradebook mapping.
//! - Define typed validation for the numeric fields collected from users.
//!
//! # Invariants
//! - Every student is identified by a canonical, case-insensitive `StudentKey`.
//! - `total_score` / `count_scores` are derived from `subjects`, never set directly.

pub mod student;
pub mod validation;
