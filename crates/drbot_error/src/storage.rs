//! Storage error types.

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Kinds of storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum StorageErrorKind {
    /// Optimistic write kept losing against concurrent edits
    #[display("Write conflict on namespace {} persisted after {} attempts", namespace, attempts)]
    Conflict {
        /// Namespace being flushed
        namespace: String,
        /// Conditional writes attempted
        attempts: u32,
    },
    /// Serialized namespace does not fit in one remote document
    #[display("Namespace {} is {} bytes, over the {} byte document limit", namespace, size, limit)]
    Capacity {
        /// Namespace being flushed
        namespace: String,
        /// Serialized size in bytes
        size: usize,
        /// Backend limit in bytes
        limit: usize,
    },
    /// Namespace name is reserved for the host
    #[display("Namespace name is reserved: {}", _0)]
    ReservedNamespace(String),
    /// Namespace was never opened on this adapter
    #[display("Unknown namespace: {}", _0)]
    UnknownNamespace(String),
    /// Value could not be serialized
    #[display("Serialization failed: {}", _0)]
    Serialization(String),
    /// Stored content could not be decoded
    #[display("Deserialization failed: {}", _0)]
    Deserialization(String),
    /// Remote backend call failed for a reason other than a conflict
    #[display("Storage backend failed: {}", _0)]
    Backend(String),
    /// Local file access failed
    #[display("File I/O failed: {}", _0)]
    Io(String),
}

/// Storage error with location tracking.
///
/// # Examples
///
/// ```
/// use drbot_error::{StorageError, StorageErrorKind};
///
/// let err = StorageError::new(StorageErrorKind::ReservedNamespace("_meta".to_string()));
/// assert!(format!("{}", err).contains("reserved"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {} at line {} in {}", kind, line, file)]
pub struct StorageError {
    /// The kind of error that occurred
    pub kind: StorageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        Self::new(StorageErrorKind::Io(e.to_string()))
    }
}
