use ptm_types::StateId;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DomainContextError {
    #[error("state {0:?} already locked by a different transaction in this context")]
    AlreadyLocked(StateId),

    #[error("context already flushed, no further operations permitted")]
    ContextSpent,

    #[error("state store error: {0}")]
    Store(String),
}
