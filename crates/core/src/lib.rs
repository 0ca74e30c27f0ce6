//! Domain core for fieldrep - conversational interaction logging.
//!
//! This crate owns the structured `InteractionRecord` under construction, the
//! merge engine that folds sparse tool extractions into it, the save-time
//! validation rules, the shared error taxonomy, and application configuration.
//! Everything here is pure and synchronous; network and storage live in the
//! `fieldrep-agent` and `fieldrep-db` crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod merge;

pub use domain::record::{
    Field, FieldViolation, InteractionRecord, Material, RecordPatch, Sentiment,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use merge::{Changeset, FieldChange, ALL_FIELDS};
