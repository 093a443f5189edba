//! Raw listing items returned by the forum.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// One item of a forum listing, before normalization.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct RawItem {
    /// Item fullname
    id: String,
    /// Author, or the acting moderator for mod log entries
    author: String,
    /// Listing time: creation, or moderation time for removal and mod log listings
    created_utc: DateTime<Utc>,
    /// Everything else the listing reports
    #[builder(default)]
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

impl RawItem {
    /// String attribute by name.
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|v| v.as_str())
    }
}

/// Cursor and size for one listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Fetch items older than this fullname; `None` starts from the newest
    pub after: Option<String>,
    /// Page size
    pub limit: usize,
}

impl PageRequest {
    /// First page of a listing.
    pub fn first(limit: usize) -> Self {
        Self { after: None, limit }
    }

    /// Page following the given cursor.
    pub fn after(cursor: impl Into<String>, limit: usize) -> Self {
        Self {
            after: Some(cursor.into()),
            limit,
        }
    }
}

/// One page of a listing, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items, newest first
    pub items: Vec<RawItem>,
    /// Cursor for the next (older) page; `None` when the listing is exhausted
    pub after: Option<String>,
}
