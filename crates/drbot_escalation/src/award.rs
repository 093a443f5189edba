//! Point awards.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use drbot_core::{SubjectId, UserId};

/// A request to add points to a user's ledger.
///
/// # Examples
///
/// ```
/// use drbot_escalation::Award;
///
/// let award = Award::new("spammer", "t3_abc", 2).with_reason(Some("Rule 1".to_string()));
/// assert_eq!(*award.points(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct Award {
    /// User receiving the points
    #[setters(skip)]
    user: UserId,
    /// Subject the points are for; the idempotency key
    #[setters(skip)]
    subject_id: SubjectId,
    /// Points awarded; must be positive
    #[setters(skip)]
    points: i64,
    /// Human-readable reason
    reason: Option<String>,
    /// When the violation happened
    timestamp: DateTime<Utc>,
    /// When the award stops counting
    expires_at: Option<DateTime<Utc>>,
}

impl Award {
    /// Create an award stamped now, with no reason and no expiry.
    pub fn new(user: impl Into<UserId>, subject_id: impl Into<SubjectId>, points: i64) -> Self {
        Self {
            user: user.into(),
            subject_id: subject_id.into(),
            points,
            reason: None,
            timestamp: Utc::now(),
            expires_at: None,
        }
    }
}
