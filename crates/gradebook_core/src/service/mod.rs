//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validation, mutation and persistence into use-case APIs.
//! - Keep the presentation layer decoupled from storage details.

pub mod gradebook_service;
