//! Threshold policy.

use drbot_error::{EscalationError, EscalationErrorKind, EscalationResult};
use serde::{Deserialize, Serialize};

/// What happens when a user's total reaches a threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ThresholdAction {
    /// Message the moderators with the user's record
    NotifyMods,
    /// Ban the user; no duration means permanent
    BanUser {
        /// Ban length in days
        #[serde(default)]
        duration_days: Option<u32>,
    },
}

/// One `(points, action)` step of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    /// Total at which the action fires
    pub points: u32,
    /// Action to fire
    #[serde(flatten)]
    pub action: ThresholdAction,
}

impl Threshold {
    /// Create a threshold.
    pub fn new(points: u32, action: ThresholdAction) -> Self {
        Self { points, action }
    }
}

/// Ordered thresholds, strictly increasing and positive.
///
/// An empty policy is valid; the engine is then a plain tally.
///
/// # Examples
///
/// ```
/// use drbot_escalation::{Threshold, ThresholdAction, ThresholdPolicy};
///
/// let policy = ThresholdPolicy::new(vec![
///     Threshold::new(3, ThresholdAction::NotifyMods),
///     Threshold::new(5, ThresholdAction::BanUser { duration_days: None }),
/// ])
/// .unwrap();
/// assert_eq!(policy.thresholds().len(), 2);
///
/// assert!(ThresholdPolicy::new(vec![
///     Threshold::new(5, ThresholdAction::NotifyMods),
///     Threshold::new(5, ThresholdAction::NotifyMods),
/// ])
/// .is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Threshold>", into = "Vec<Threshold>")]
pub struct ThresholdPolicy {
    thresholds: Vec<Threshold>,
}

impl ThresholdPolicy {
    /// Validate and build a policy.
    pub fn new(thresholds: Vec<Threshold>) -> EscalationResult<Self> {
        if let Some(zero) = thresholds.iter().find(|t| t.points == 0) {
            return Err(EscalationError::new(EscalationErrorKind::InvalidPolicy(
                format!("threshold {:?} must be above zero", zero.action),
            )));
        }
        if let Some(pair) = thresholds.windows(2).find(|w| w[0].points >= w[1].points) {
            return Err(EscalationError::new(EscalationErrorKind::InvalidPolicy(
                format!(
                    "thresholds must be strictly increasing, found {} then {}",
                    pair[0].points, pair[1].points
                ),
            )));
        }
        Ok(Self { thresholds })
    }

    /// Thresholds in ascending order.
    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// Whether there is nothing to fire.
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

impl TryFrom<Vec<Threshold>> for ThresholdPolicy {
    type Error = EscalationError;

    fn try_from(thresholds: Vec<Threshold>) -> Result<Self, Self::Error> {
        Self::new(thresholds)
    }
}

impl From<ThresholdPolicy> for Vec<Threshold> {
    fn from(policy: ThresholdPolicy) -> Self {
        policy.thresholds
    }
}
