//! Stream checkpoints.

use crate::SubjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Durable cursor marking the last processed position of one stream.
///
/// Besides the newest id and timestamp it keeps a bounded window of recently
/// seen ids so a restarted poller still rejects boundary duplicates.
///
/// # Examples
///
/// ```
/// use drbot_core::{Checkpoint, SubjectId};
/// use chrono::Utc;
///
/// let mut checkpoint = Checkpoint::default();
/// checkpoint.advance(SubjectId::new("t3_a"), Utc::now(), 2);
/// checkpoint.advance(SubjectId::new("t3_b"), Utc::now(), 2);
/// checkpoint.advance(SubjectId::new("t3_c"), Utc::now(), 2);
///
/// assert_eq!(checkpoint.last_id.as_ref().map(|id| id.as_str()), Some("t3_c"));
/// assert_eq!(checkpoint.recent_ids.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Newest item handed off
    #[serde(default)]
    pub last_id: Option<SubjectId>,
    /// Timestamp of the newest item handed off
    #[serde(default)]
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Recently handed-off ids, oldest first
    #[serde(default)]
    pub recent_ids: VecDeque<SubjectId>,
}

impl Checkpoint {
    /// Whether nothing was ever recorded for the stream.
    pub fn is_empty(&self) -> bool {
        self.last_id.is_none() && self.last_timestamp.is_none()
    }

    /// Record an id as handed off, keeping at most `window` recent ids.
    pub fn advance(&mut self, id: SubjectId, timestamp: DateTime<Utc>, window: usize) {
        if self.last_timestamp.is_none_or(|last| timestamp >= last) {
            self.last_timestamp = Some(timestamp);
            self.last_id = Some(id.clone());
        }
        if !self.recent_ids.contains(&id) {
            self.recent_ids.push_back(id);
        }
        while self.recent_ids.len() > window {
            self.recent_ids.pop_front();
        }
    }

    /// Whether the id is the checkpoint id or in the recent window.
    pub fn has_seen(&self, id: &SubjectId) -> bool {
        self.last_id.as_ref() == Some(id) || self.recent_ids.contains(id)
    }
}
