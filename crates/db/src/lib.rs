//! Persistence collaborator for fieldrep: sqlite storage of saved
//! interaction records behind the [`repositories::InteractionRepository`]
//! trait. Validation happens in the caller; this crate only stores what it
//! is given and reports what it finds.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{InteractionRepository, RepositoryError, SqlInteractionRepository};
