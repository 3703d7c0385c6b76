use thiserror::Error;

use super::entities::JoinStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("moderated sessions require a non-empty scope")]
    MissingScope,

    #[error("plain sessions cannot carry a scope or context")]
    UnexpectedScope,

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("session lifetime must be positive")]
    InvalidLifetime,

    #[error("join request is already {0}")]
    AlreadyDecided(JoinStatus),

    #[error("usage limit of {limit} reached")]
    QuotaExhausted { limit: u32 },
}
