//! Core data types for the DrBot moderation host.
//!
//! This crate provides the event model shared by the poller, the dispatcher
//! and every Botling: normalized events, the raw items they are built from,
//! and the per-stream checkpoints that mark how far each stream has been read.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod event;
mod ids;
mod item;
mod kind;
mod payload;

pub use checkpoint::Checkpoint;
pub use event::{Event, EventBuilder, EventBuilderError};
pub use ids::{SubjectId, UserId};
pub use item::{Page, PageRequest, RawItem, RawItemBuilder};
pub use kind::EventKind;
pub use payload::{FlairDetails, ModActionDetails, ModmailDetails, Payload, RemovalDetails};

/// Placeholder author the forum reports for deleted accounts.
pub const DELETED_USER: &str = "[deleted]";
