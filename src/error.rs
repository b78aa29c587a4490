//! Error taxonomy shared by every room operation.
//!
//! Every variant except the infrastructure ones (`Database`, `Io`, `Corrupt`)
//! is recoverable and is reported straight back to the caller or connection.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("access denied")]
    AccessDenied,

    #[error("no such room: {0}")]
    RoomNotFound(Uuid),

    #[error("discussion has ended")]
    RoomClosed,

    #[error("already joined room {0}")]
    AlreadyJoined(Uuid),

    #[error("not joined to any room")]
    NotJoined,

    #[error("room {0} has no summary")]
    SummaryMissing(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable code sent to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Auth(_) => "auth_error",
            Self::AccessDenied => "access_denied",
            Self::RoomNotFound(_) => "room_not_found",
            Self::RoomClosed => "room_closed",
            Self::AlreadyJoined(_) => "already_joined",
            Self::NotJoined => "not_joined",
            Self::SummaryMissing(_) => "summary_missing",
            Self::Database(_) | Self::Io(_) | Self::Corrupt(_) => "internal_error",
        }
    }

    /// Infrastructure failures; their details stay in the server log.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_) | Self::Corrupt(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_and_denied_are_distinct() {
        assert_ne!(CoreError::RoomClosed.code(), CoreError::AccessDenied.code());
        assert!(!CoreError::RoomClosed.is_internal());
        assert!(CoreError::Corrupt("x".into()).is_internal());
    }
}
