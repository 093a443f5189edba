//! Botling runtime error types.

use crate::{EscalationError, ForumError, StorageError};

/// Result type for botling hooks.
pub type BotlingResult<T> = Result<T, BotlingError>;

/// Kinds of errors a botling handler can raise.
#[derive(Debug, Clone, derive_more::Display)]
pub enum BotlingErrorKind {
    /// Handler logic failed.
    #[display("Handler failed: {}", _0)]
    Handler(String),
    /// Settings could not be read as the expected type.
    #[display("Bad setting {}: {}", name, message)]
    Setting {
        /// Option name
        name: String,
        /// Decoding failure
        message: String,
    },
    /// Handler panicked; caught at the dispatch boundary.
    #[display("Handler panicked: {}", _0)]
    Panic(String),
    /// Forum call failed.
    #[display("{}", _0)]
    Forum(ForumError),
    /// Storage access failed.
    #[display("{}", _0)]
    Storage(StorageError),
    /// Escalation engine rejected an operation.
    #[display("{}", _0)]
    Escalation(EscalationError),
}

/// Botling error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Botling Error: {} at line {} in {}", kind, line, file)]
pub struct BotlingError {
    /// The kind of error that occurred
    pub kind: BotlingErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl BotlingError {
    /// Create a new botling error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: BotlingErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for a handler failure with a message.
    #[track_caller]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::new(BotlingErrorKind::Handler(message.into()))
    }
}

impl From<ForumError> for BotlingError {
    #[track_caller]
    fn from(e: ForumError) -> Self {
        Self::new(BotlingErrorKind::Forum(e))
    }
}

impl From<StorageError> for BotlingError {
    #[track_caller]
    fn from(e: StorageError) -> Self {
        Self::new(BotlingErrorKind::Storage(e))
    }
}

impl From<EscalationError> for BotlingError {
    #[track_caller]
    fn from(e: EscalationError) -> Self {
        Self::new(BotlingErrorKind::Escalation(e))
    }
}
