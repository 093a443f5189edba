//! Event stream error types.

/// Result type for stream polling.
pub type StreamResult<T> = Result<T, StreamError>;

/// Kinds of stream errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum StreamErrorKind {
    /// Fetch kept failing after every backoff attempt; the stream pauses until next cycle.
    #[display("Transient fetch failure on {} after {} attempts: {}", stream, attempts, message)]
    TransientFetch {
        /// Stream kind
        stream: String,
        /// Attempts made
        attempts: usize,
        /// Last error message
        message: String,
    },
    /// Fetch failed with a non-retryable error.
    #[display("Fetch failed on {}: {}", stream, message)]
    Fetch {
        /// Stream kind
        stream: String,
        /// Error message
        message: String,
    },
    /// Checkpoint could not be loaded or saved.
    #[display("Checkpoint failure on {}: {}", stream, message)]
    Checkpoint {
        /// Stream kind
        stream: String,
        /// Error message
        message: String,
    },
}

impl StreamErrorKind {
    /// Check if the stream may simply be polled again later.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::TransientFetch { .. })
    }
}

/// Stream error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Stream Error: {} at line {} in {}", kind, line, file)]
pub struct StreamError {
    /// The kind of error that occurred
    pub kind: StreamErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StreamError {
    /// Create a new stream error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StreamErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Check if the stream may simply be polled again later.
    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }
}
