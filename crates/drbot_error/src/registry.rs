//! Botling registration error types.

/// Result type for registration.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Kinds of registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum RegistryErrorKind {
    /// Another botling already holds this name.
    #[display("Botling name already registered: {}", _0)]
    DuplicateName(String),

    /// Name collides with a host-reserved namespace.
    #[display("Botling name is reserved: {}", _0)]
    ReservedName(String),

    /// Settings failed the schema validators or the botling's own hook.
    #[display("Invalid settings for {}: {}", botling, message)]
    Settings {
        /// Botling name
        botling: String,
        /// Validation message
        message: String,
    },

    /// Storage namespace could not be bound.
    #[display("Storage unavailable for {}: {}", botling, message)]
    Storage {
        /// Botling name
        botling: String,
        /// Underlying error
        message: String,
    },

    /// Botling setup hook failed.
    #[display("Setup failed for {}: {}", botling, message)]
    Setup {
        /// Botling name
        botling: String,
        /// Underlying error
        message: String,
    },
}

/// Registration error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Registry Error: {} at line {} in {}", kind, line, file)]
pub struct RegistryError {
    /// The kind of error that occurred
    pub kind: RegistryErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl RegistryError {
    /// Create a new registry error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RegistryErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
