//! Escalation engine error types.

/// Result type for escalation operations.
pub type EscalationResult<T> = Result<T, EscalationError>;

/// Kinds of escalation errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum EscalationErrorKind {
    /// Award of zero or negative points, ledger untouched.
    #[display("Invalid award of {} points for {}", points, subject)]
    InvalidAward {
        /// Requested points
        points: i64,
        /// Subject the award was for
        subject: String,
    },

    /// Threshold list is not strictly increasing or contains zero.
    #[display("Invalid threshold policy: {}", _0)]
    InvalidPolicy(String),

    /// Point map configuration is malformed.
    #[display("Invalid point map: {}", _0)]
    InvalidPointMap(String),
}

/// Escalation error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Escalation Error: {} at line {} in {}", kind, line, file)]
pub struct EscalationError {
    /// The kind of error that occurred
    pub kind: EscalationErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl EscalationError {
    /// Create a new escalation error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: EscalationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
