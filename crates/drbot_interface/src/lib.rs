//! Collaborator traits for the DrBot moderation host.
//!
//! The host never talks HTTP itself. Everything it needs from the forum is
//! expressed by [`ForumClient`], and everything it needs from configuration by
//! [`SettingsSource`]. [`MemoryForum`] is a deterministic in-memory forum for
//! tests and dry runs; [`ThrottledForum`] wraps any client with a request quota.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod forum;
mod memory;
mod settings;
mod throttle;

pub use forum::{Document, DocumentVersion, ForumClient, MessageTarget};
pub use memory::{BanRecord, MemoryForum, SentMessage};
pub use settings::{SettingsSource, StaticSettings};
pub use throttle::ThrottledForum;
