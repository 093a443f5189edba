//! Per-user point ledger.

use chrono::{DateTime, Utc};
use drbot_core::{SubjectId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One line of a user's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryRecord {
    /// Points awarded for a subject
    Award {
        /// Subject the award was for
        subject_id: SubjectId,
        /// Points awarded
        points: u32,
        /// When the violation happened
        timestamp: DateTime<Utc>,
        /// Reason given
        #[serde(default)]
        reason: Option<String>,
        /// When the award stops counting
        #[serde(default)]
        expires_at: Option<DateTime<Utc>>,
        /// Award has aged out and no longer counts
        #[serde(default)]
        expired: bool,
        /// When the subject was reapproved, cancelling the award
        #[serde(default)]
        revoked_at: Option<DateTime<Utc>>,
    },
    /// A ban threshold fired
    Ban {
        /// Threshold that fired
        threshold: u32,
        /// When the ban was attempted
        timestamp: DateTime<Utc>,
        /// Whether the forum accepted the ban
        succeeded: bool,
    },
    /// Points and fired thresholds cleared, starting a new interval
    Reset {
        /// Subject that triggered the reset (e.g. the ban log entry)
        subject_id: SubjectId,
        /// When the reset happened
        timestamp: DateTime<Utc>,
        /// Why
        #[serde(default)]
        reason: Option<String>,
    },
}

impl HistoryRecord {
    /// Subject id of an award or reset.
    pub fn subject_id(&self) -> Option<&SubjectId> {
        match self {
            HistoryRecord::Award { subject_id, .. } | HistoryRecord::Reset { subject_id, .. } => {
                Some(subject_id)
            }
            HistoryRecord::Ban { .. } => None,
        }
    }
}

/// A user's running total, fired thresholds and history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Points counted toward thresholds in the current interval
    pub points: u64,
    /// Thresholds already fired in the current interval
    #[serde(default)]
    pub fired: BTreeSet<u32>,
    /// Everything that ever happened to this user, oldest first
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
}

impl LedgerEntry {
    /// Whether an award for this subject at `timestamp` repeats a recorded one.
    ///
    /// A removal after the subject's reapproval is a new violation; anything
    /// older is a replay.
    pub fn repeats_award(&self, subject_id: &SubjectId, timestamp: DateTime<Utc>) -> bool {
        self.history.iter().any(|record| match record {
            HistoryRecord::Award {
                subject_id: seen,
                revoked_at,
                ..
            } if seen == subject_id => revoked_at.is_none_or(|at| timestamp <= at),
            _ => false,
        })
    }

    /// Whether a reset for this subject was ever recorded.
    pub fn has_reset_for(&self, subject_id: &SubjectId) -> bool {
        self.history.iter().any(|record| {
            matches!(record, HistoryRecord::Reset { subject_id: seen, .. } if seen == subject_id)
        })
    }

    /// History since the most recent reset.
    pub fn current_interval(&self) -> &[HistoryRecord] {
        let start = self
            .history
            .iter()
            .rposition(|record| matches!(record, HistoryRecord::Reset { .. }))
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.history[start..]
    }

    /// Sum of unexpired awards since the most recent reset.
    pub fn recompute(&mut self) -> u64 {
        self.points = self
            .current_interval()
            .iter()
            .map(|record| match record {
                HistoryRecord::Award {
                    points,
                    expired: false,
                    revoked_at: None,
                    ..
                } => u64::from(*points),
                _ => 0,
            })
            .sum();
        self.points
    }
}

/// All users tracked by one Botling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: BTreeMap<UserId, LedgerEntry>,
}

impl Ledger {
    /// Entry for a user, if one was ever created.
    pub fn get(&self, user: &UserId) -> Option<&LedgerEntry> {
        self.entries.get(user)
    }

    /// Current points of a user; unknown users have zero.
    pub fn points(&self, user: &UserId) -> u64 {
        self.entries.get(user).map(|e| e.points).unwrap_or(0)
    }

    pub(crate) fn get_mut(&mut self, user: &UserId) -> Option<&mut LedgerEntry> {
        self.entries.get_mut(user)
    }

    /// Entry for a user, created on demand.
    pub(crate) fn entry(&mut self, user: &UserId) -> &mut LedgerEntry {
        self.entries.entry(user.clone()).or_default()
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = (&UserId, &mut LedgerEntry)> {
        self.entries.iter_mut()
    }

    /// Every tracked user.
    pub fn users(&self) -> impl Iterator<Item = &UserId> {
        self.entries.keys()
    }

    /// Number of tracked users.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no user is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
