//! Storage adapter configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the storage adapter.
///
/// # Examples
///
/// ```
/// use drbot_storage::StorageConfig;
///
/// let config = StorageConfig::default().with_prefix("modbot".to_string());
/// assert_eq!(config.document_path("Pointling"), "modbot/Pointling");
/// assert_eq!(*config.max_document_bytes(), 524288);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
pub struct StorageConfig {
    /// Document path prefix; each namespace lives at `<prefix>/<name>`
    #[serde(default = "default_prefix")]
    prefix: String,

    /// Largest document the backend accepts, in bytes
    #[serde(default = "default_max_document_bytes")]
    max_document_bytes: usize,

    /// Conditional-write retries after the first conflict
    #[serde(default = "default_conflict_retries")]
    conflict_retries: u32,

    /// Periodic flush interval (seconds)
    #[serde(default = "default_flush_interval_secs")]
    flush_interval_secs: u64,

    /// Directory for local backups of every serialized document
    #[serde(default)]
    backup_dir: Option<PathBuf>,

    /// First line of every document
    #[serde(default = "default_banner")]
    banner: String,

    /// Serialize and check documents but never write them remotely
    #[serde(default)]
    dry_run: bool,
}

fn default_prefix() -> String {
    "drbot".to_string()
}

fn default_max_document_bytes() -> usize {
    524_288
}

fn default_conflict_retries() -> u32 {
    3
}

fn default_flush_interval_secs() -> u64 {
    300
}

fn default_banner() -> String {
    "This page houses DrBot's records. **DO NOT EDIT!**".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            max_document_bytes: default_max_document_bytes(),
            conflict_retries: default_conflict_retries(),
            flush_interval_secs: default_flush_interval_secs(),
            backup_dir: None,
            banner: default_banner(),
            dry_run: false,
        }
    }
}

impl StorageConfig {
    /// Remote path of a namespace document.
    pub fn document_path(&self, namespace: &str) -> String {
        format!("{}/{}", self.prefix, namespace)
    }
}
