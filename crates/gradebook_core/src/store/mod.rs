//! Record Store contract and persistence backends.
//!
//! # Responsibility
//! - Load and save the full gradebook snapshot.
//! - Keep file/SQL details out of the gradebook service.
//!
//! # Invariants
//! - `save` replaces all prior state; there are no incremental writes.
//! - `load` on a store with no prior state returns an empty gradebook.
//! - Stores enforce structural shape only, never grading rules.

pub mod json_store;
pub mod record_store;
pub mod sqlite_store;
