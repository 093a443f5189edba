//! Top-level error wrapper types.

use crate::{
    BotlingError, ConfigError, EscalationError, ForumError, RegistryError, StorageError,
    StreamError,
};

/// Every error the host can surface, one variant per area.
///
/// # Examples
///
/// ```
/// use drbot_error::{DrbotError, ConfigError};
///
/// let config_err = ConfigError::new("No streams configured");
/// let err: DrbotError = config_err.into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum DrbotErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Forum collaborator error
    #[from(ForumError)]
    Forum(ForumError),
    /// Storage adapter error
    #[from(StorageError)]
    Storage(StorageError),
    /// Event stream error
    #[from(StreamError)]
    Stream(StreamError),
    /// Botling registration error
    #[from(RegistryError)]
    Registry(RegistryError),
    /// Botling runtime error
    #[from(BotlingError)]
    Botling(BotlingError),
    /// Escalation engine error
    #[from(EscalationError)]
    Escalation(EscalationError),
}

/// DrBot error with kind discrimination.
///
/// # Examples
///
/// ```
/// use drbot_error::{DrbotResult, ConfigError};
///
/// fn might_fail() -> DrbotResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("DrBot Error: {}", _0)]
pub struct DrbotError(Box<DrbotErrorKind>);

impl DrbotError {
    /// Create a new error from a kind.
    pub fn new(kind: DrbotErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &DrbotErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to DrbotErrorKind
impl<T> From<T> for DrbotError
where
    T: Into<DrbotErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for DrBot operations.
pub type DrbotResult<T> = std::result::Result<T, DrbotError>;
