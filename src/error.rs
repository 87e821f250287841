//! Unified error handling for anonrelay.
//!
//! Layer errors live next to their layer ([`crate::db::DbError`],
//! [`crate::cache::CacheError`], [`crate::delivery::BrokerError`],
//! [`crate::config::ConfigError`]). This module holds the dispatch-level
//! error every handler returns, with metric labels and reply generation.

use crate::cache::CacheError;
use crate::db::DbError;
use thiserror::Error;

/// Reply sent for failures that carry no user-facing explanation.
pub const GENERIC_FAILURE_REPLY: &str = "Something went wrong, please try again later";

/// Reply sent when a concurrent request holds the same lock.
pub const BUSY_REPLY: &str = "Your previous request is still being processed, try again";

/// Reply sent when a non-admin uses an admin command.
pub const FORBIDDEN_REPLY: &str = "Forbidden: this command is for admins only";

// ============================================================================
// Handler Errors (intent processing)
// ============================================================================

/// User input that was rejected. The state is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("no active room with code {0}")]
    UnknownCode(String),

    #[error("username is empty")]
    EmptyUsername,

    #[error("username longer than {max} characters")]
    UsernameTooLong { max: usize },

    #[error("username {0} is taken in this room")]
    UsernameTaken(String),

    #[error("room code {0} is taken")]
    RoomCodeTaken(String),

    #[error("room code is empty or malformed")]
    MalformedCode,

    #[error("unknown user {0}")]
    UnknownUser(String),

    #[error("user {0} is already an admin")]
    AlreadyAdmin(String),

    #[error("no room with code {0}")]
    UnknownRoom(String),

    #[error("expected text input")]
    ExpectedText,

    #[error("user is still in a room")]
    LeaveRoomFirst,
}

impl InvalidInput {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownCode(_) => "unknown_code",
            Self::EmptyUsername => "empty_username",
            Self::UsernameTooLong { .. } => "username_too_long",
            Self::UsernameTaken(_) => "username_taken",
            Self::RoomCodeTaken(_) => "room_code_taken",
            Self::MalformedCode => "malformed_code",
            Self::UnknownUser(_) => "unknown_user",
            Self::AlreadyAdmin(_) => "already_admin",
            Self::UnknownRoom(_) => "unknown_room",
            Self::ExpectedText => "expected_text",
            Self::LeaveRoomFirst => "leave_room_first",
        }
    }

    /// Prompt shown to the user. Ends with a retry hint where retrying helps.
    pub fn reply(&self) -> String {
        match self {
            Self::UnknownCode(_) => "Invalid Code".to_string(),
            Self::EmptyUsername => "Username can't be empty, try again".to_string(),
            Self::UsernameTooLong { max } => {
                format!("Username is too long (max {max} characters), try again")
            }
            Self::UsernameTaken(name) => {
                format!("Username {name} is already taken in this room, try another one")
            }
            Self::RoomCodeTaken(_) => "This code is already taken(\nTry again!!!".to_string(),
            Self::MalformedCode => "Code must be a single word, try again".to_string(),
            Self::UnknownUser(_) => "This user doesn`t exist at this bot!".to_string(),
            Self::AlreadyAdmin(_) => "This user already admin!".to_string(),
            Self::UnknownRoom(code) => format!("Room with code {code} doesn't exist"),
            Self::ExpectedText => "Please send text".to_string(),
            Self::LeaveRoomFirst => "Leave the room with /exit first".to_string(),
        }
    }
}

/// Errors that can occur while handling an intent.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),

    /// The status or draft refers to something that no longer resolves.
    #[error("missing context: {0}")]
    MissingContext(String),

    #[error("user {0} is not an admin")]
    Forbidden(String),

    /// Someone else holds the lock guarding this step.
    #[error("lock {0} is busy")]
    Busy(String),

    #[error("unhandled conversation status: {0}")]
    UnhandledStatus(String),

    #[error("directory error: {0}")]
    Db(#[from] DbError),

    #[error("cache error: {0}")]
    Cache(CacheError),
}

impl From<CacheError> for HandlerError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::UnknownStatus(raw) => Self::UnhandledStatus(raw),
            CacheError::Directory(db) => Self::Db(db),
            other => Self::Cache(other),
        }
    }
}

impl HandlerError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(input) => input.code(),
            Self::MissingContext(_) => "missing_context",
            Self::Forbidden(_) => "forbidden",
            Self::Busy(_) => "busy",
            Self::UnhandledStatus(_) => "unhandled_status",
            Self::Db(_) => "db_error",
            Self::Cache(_) => "cache_error",
        }
    }

    /// Text of the single reply sent for this error.
    pub fn user_reply(&self) -> String {
        match self {
            Self::InvalidInput(input) => input.reply(),
            Self::Forbidden(_) => FORBIDDEN_REPLY.to_string(),
            Self::Busy(_) => BUSY_REPLY.to_string(),
            Self::MissingContext(_) | Self::UnhandledStatus(_) | Self::Db(_) | Self::Cache(_) => {
                GENERIC_FAILURE_REPLY.to_string()
            }
        }
    }

    /// Whether the error reflects a fault rather than a user mistake.
    pub fn is_internal(&self) -> bool {
        !matches!(
            self,
            Self::InvalidInput(_) | Self::Forbidden(_) | Self::Busy(_)
        )
    }
}

/// Result type for intent handlers.
pub type HandlerResult = Result<(), HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_codes() {
        assert_eq!(
            HandlerError::from(InvalidInput::UsernameTaken("bob".into())).error_code(),
            "username_taken"
        );
        assert_eq!(HandlerError::Forbidden("u1".into()).error_code(), "forbidden");
        assert_eq!(
            HandlerError::MissingContext("room".into()).error_code(),
            "missing_context"
        );
    }

    #[test]
    fn test_unknown_status_becomes_unhandled() {
        let err = HandlerError::from(CacheError::UnknownStatus("{}".into()));
        assert!(matches!(err, HandlerError::UnhandledStatus(_)));
        assert_eq!(err.user_reply(), GENERIC_FAILURE_REPLY);
        assert!(err.is_internal());
    }

    #[test]
    fn test_replies() {
        assert_eq!(
            HandlerError::from(InvalidInput::UnknownCode("X".into())).user_reply(),
            "Invalid Code"
        );
        assert_eq!(HandlerError::Forbidden("u1".into()).user_reply(), FORBIDDEN_REPLY);
        assert!(!HandlerError::Forbidden("u1".into()).is_internal());
    }
}
