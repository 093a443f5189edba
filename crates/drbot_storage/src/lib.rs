//! Namespaced, document-backed storage for DrBot Botlings.
//!
//! Each Botling owns one [`Namespace`]: a string-keyed map of JSON values
//! persisted as one remote document. Writes are buffered in memory and
//! flushed with optimistic concurrency through the forum's document API.
//!
//! Stream checkpoints are persisted through the [`CheckpointStore`] trait,
//! with in-memory, remote-document and local-file implementations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod checkpoint;
mod config;
mod document;
mod namespace;

pub use adapter::{FlushOutcome, FlushSummary, StorageAdapter};
pub use checkpoint::{
    CheckpointStore, DocumentCheckpointStore, JsonFileCheckpointStore, MemoryCheckpointStore,
};
pub use config::{StorageConfig, StorageConfigBuilder};
pub use document::{parse_document, render_document};
pub use namespace::Namespace;

/// Namespace reserved for host bookkeeping.
pub const META_NAMESPACE: &str = "_meta";

/// Storage format version written into the meta namespace.
pub const FORMAT_VERSION: &str = "2.0.0";
