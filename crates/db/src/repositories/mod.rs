use async_trait::async_trait;
use thiserror::Error;

use fieldrep_core::InteractionRecord;

pub mod interaction;

pub use interaction::SqlInteractionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("interaction {0} not found")]
    NotFound(i64),
    #[error("record is missing required fields; validate before saving")]
    Unvalidated,
    #[error("stored interaction {id} is corrupt: {detail}")]
    Corrupt { id: i64, detail: String },
    #[error("database failure: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage boundary for saved interaction records. Implementations own their
/// atomicity; callers are responsible for running `validate_for_save` before
/// `save` or `update`.
#[async_trait]
pub trait InteractionRepository: Send + Sync {
    /// Persists a new record and returns its assigned id.
    async fn save(&self, record: &InteractionRecord) -> Result<i64, RepositoryError>;
    async fn load(&self, id: i64) -> Result<InteractionRecord, RepositoryError>;
    async fn update(&self, id: i64, record: &InteractionRecord)
        -> Result<InteractionRecord, RepositoryError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<InteractionRecord>, RepositoryError>;
    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;
}
