use thiserror::Error;

use crate::application::ports::RoomError;
use crate::domain::DomainError;

/// Errors surfaced by application commands.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or disallowed input.
    #[error("{0}")]
    Validation(String),

    /// Unknown session or join request.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The session existed but has expired; it has been retired.
    #[error("session has expired")]
    Gone,

    /// Missing/invalid capability, wrong role or wrong session kind.
    #[error("{0}")]
    Forbidden(&'static str),

    /// The join request was already decided.
    #[error("{0}")]
    Conflict(String),

    #[error("usage limit reached")]
    RateLimited,

    /// A required external credential is absent.
    #[error("{0} is not configured")]
    Configuration(&'static str),

    /// A mandatory collaborator call failed.
    #[error("upstream service failed: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::AlreadyDecided(_) => AppError::Conflict(err.to_string()),
            DomainError::QuotaExhausted { .. } => AppError::RateLimited,
            DomainError::MissingScope
            | DomainError::UnexpectedScope
            | DomainError::TooLong { .. }
            | DomainError::InvalidLifetime => AppError::Validation(err.to_string()),
        }
    }
}

impl From<RoomError> for AppError {
    fn from(err: RoomError) -> Self {
        AppError::Upstream(err.to_string())
    }
}
