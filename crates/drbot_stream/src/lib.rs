//! Checkpointed moderation event polling for DrBot.
//!
//! An [`EventPoller`] reads one forum listing (one [`EventKind`](drbot_core::EventKind))
//! newest-first down to its checkpoint, then hands the new items out
//! oldest-first as normalized [`Event`](drbot_core::Event)s. The checkpoint
//! moves only when the caller commits a batch, so a crash between handoff and
//! commit replays the batch rather than losing it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dedup;
mod normalize;
mod poller;

pub use config::{StreamConfig, StreamConfigBuilder};
pub use dedup::DedupWindow;
pub use normalize::normalize;
pub use poller::{Batch, EventPoller};
