//! Error types for the DrBot moderation host.
//!
//! This crate provides the foundation error types used throughout the DrBot workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use drbot_error::{DrbotResult, ConfigError};
//!
//! fn load() -> DrbotResult<String> {
//!     Err(ConfigError::new("subreddit is not set"))?
//! }
//!
//! match load() {
//!     Ok(name) => println!("Got: {}", name),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod botling;
mod config;
mod error;
mod escalation;
mod forum;
mod registry;
mod storage;
mod stream;

pub use botling::{BotlingError, BotlingErrorKind, BotlingResult};
pub use config::ConfigError;
pub use error::{DrbotError, DrbotErrorKind, DrbotResult};
pub use escalation::{EscalationError, EscalationErrorKind, EscalationResult};
pub use forum::{ForumError, ForumErrorKind, ForumResult, RetryableError};
pub use registry::{RegistryError, RegistryErrorKind, RegistryResult};
pub use storage::{StorageError, StorageErrorKind, StorageResult};
pub use stream::{StreamError, StreamErrorKind, StreamResult};
