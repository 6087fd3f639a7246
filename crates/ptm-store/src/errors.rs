use ptm_types::PtmError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("idempotency mismatch for key {key}")]
    IdempotencyMismatch { key: String },

    #[error("no transaction with id {0}")]
    NotFound(uuid::Uuid),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for PtmError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IdempotencyMismatch { key } => PtmError::IdempotencyMismatch { key },
            other => PtmError::StoreTransient(other.to_string()),
        }
    }
}
