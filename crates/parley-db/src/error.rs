use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T, E = ChatError> = std::result::Result<T, E>;

/// Failure of a single chat action. Every variant means the whole action was
/// rolled back.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Malformed or missing input. Never worth retrying.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The actor has no rights over the entity.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The action would break a store invariant, e.g. a third member in a
    /// private conversation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Store unreachable or busy. Safe to retry the whole action.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(#[source] rusqlite::Error),
}

impl ChatError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<rusqlite::Error> for ChatError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::OutOfMemory,
            ) => Self::Unavailable(err.to_string()),
            _ => Self::Storage(err),
        }
    }
}
