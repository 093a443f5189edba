//! Forum API error types.

/// Result type for forum collaborator calls.
pub type ForumResult<T> = Result<T, ForumError>;

/// Kinds of errors a forum client can report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ForumErrorKind {
    /// Network hiccup or 5xx from the forum.
    #[display("Transient forum failure: {}", _0)]
    Transient(String),

    /// Request quota exhausted.
    #[display("Rate limited: retry after {}s", _0)]
    RateLimited(u64),

    /// Requested object does not exist.
    #[display("Not found: {}", _0)]
    NotFound(String),

    /// Account lacks the permission for this call.
    #[display("Forbidden: {}", _0)]
    Forbidden(String),

    /// Conditional document write lost against a newer revision.
    #[display("Version conflict on {}: expected {:?}, found {:?}", path, expected, found)]
    VersionConflict {
        /// Document path.
        path: String,
        /// Version the writer based its edit on.
        expected: Option<u64>,
        /// Version currently stored remotely.
        found: Option<u64>,
    },

    /// Ban call rejected (already banned, user suspended, ...).
    #[display("Ban failed for {}: {}", user, reason)]
    BanFailed {
        /// Target user.
        user: String,
        /// Rejection reason.
        reason: String,
    },

    /// Any other non-retryable failure.
    #[display("Permanent forum failure: {}", _0)]
    Permanent(String),
}

impl ForumErrorKind {
    /// Check if the failure is worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited(_))
    }

    /// Get retry strategy parameters for this error.
    ///
    /// Returns `(initial_backoff_ms, max_retries, max_delay_secs)`.
    pub fn retry_strategy_params(&self) -> (u64, usize, u64) {
        match self {
            // Quota windows are a minute wide on the forum
            Self::RateLimited(secs) => ((*secs).max(1) * 1000, 3, 120),
            _ => (500, 5, 30),
        }
    }
}

/// Forum error with location tracking.
///
/// # Examples
///
/// ```
/// use drbot_error::{ForumError, ForumErrorKind, RetryableError};
///
/// let err = ForumError::new(ForumErrorKind::Transient("502 Bad Gateway".to_string()));
/// assert!(err.is_retryable());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Forum Error: {} at line {} in {}", kind, line, file)]
pub struct ForumError {
    /// The kind of error that occurred
    pub kind: ForumErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ForumError {
    /// Create a new forum error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ForumErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Check whether this is a conditional-write conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self.kind, ForumErrorKind::VersionConflict { .. })
    }
}

/// Trait for errors that know whether they should be retried.
///
/// Transient errors like a 503 or a rate limit should return true.
/// Permanent errors like a 403 should return false.
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    fn is_retryable(&self) -> bool;

    /// Get retry strategy parameters for this error.
    ///
    /// Returns `(initial_backoff_ms, max_retries, max_delay_secs)`.
    fn retry_strategy_params(&self) -> (u64, usize, u64) {
        (500, 5, 30)
    }
}

impl RetryableError for ForumError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    fn retry_strategy_params(&self) -> (u64, usize, u64) {
        self.kind.retry_strategy_params()
    }
}
