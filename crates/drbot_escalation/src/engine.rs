//! The points-to-ban state machine.

use crate::{ActionSink, Award, HistoryRecord, Ledger, NotifyReport, ThresholdAction, ThresholdPolicy};
use chrono::{DateTime, Utc};
use drbot_core::{SubjectId, UserId};
use drbot_error::{EscalationError, EscalationErrorKind, EscalationResult};
use tracing::{debug, info, instrument, warn};

/// Result of an accepted award.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwardOutcome {
    /// Award added to the ledger
    Recorded {
        /// User's total after the award
        total: u64,
        /// Thresholds fired by this award, ascending
        fired: Vec<u32>,
    },
    /// The subject was already awarded; nothing changed
    Duplicate,
}

/// Ledger plus threshold policy for one Botling.
///
/// # Examples
///
/// ```
/// use drbot_escalation::{Award, AwardOutcome, EscalationEngine, ForumActions, ThresholdPolicy};
/// use drbot_interface::MemoryForum;
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let actions = ForumActions::new(Arc::new(MemoryForum::new("DrBot")), false);
/// let mut engine = EscalationEngine::new(ThresholdPolicy::default());
///
/// let outcome = engine.award(Award::new("u", "t3_a", 2), &actions).await.unwrap();
/// assert_eq!(outcome, AwardOutcome::Recorded { total: 2, fired: vec![] });
///
/// let replay = engine.award(Award::new("u", "t3_a", 2), &actions).await.unwrap();
/// assert_eq!(replay, AwardOutcome::Duplicate);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct EscalationEngine {
    policy: ThresholdPolicy,
    ledger: Ledger,
}

impl EscalationEngine {
    /// Create an engine with an empty ledger.
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self::with_ledger(policy, Ledger::default())
    }

    /// Create an engine over an existing ledger.
    pub fn with_ledger(policy: ThresholdPolicy, ledger: Ledger) -> Self {
        Self { policy, ledger }
    }

    /// Threshold policy.
    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// Current ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Current points of a user.
    pub fn points(&self, user: &UserId) -> u64 {
        self.ledger.points(user)
    }

    /// Record an award and fire every threshold it reaches.
    ///
    /// Rejects non-positive awards without touching the ledger. A subject
    /// already in the user's history yields [`AwardOutcome::Duplicate`].
    /// Thresholds are marked fired before their action runs, and action
    /// failures are logged, so a failing ban is never retried.
    #[instrument(skip(self, award, sink), fields(user = %award.user(), subject_id = %award.subject_id(), points = award.points()))]
    pub async fn award(
        &mut self,
        award: Award,
        sink: &dyn ActionSink,
    ) -> EscalationResult<AwardOutcome> {
        let points = u32::try_from(*award.points())
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| {
                EscalationError::new(EscalationErrorKind::InvalidAward {
                    points: *award.points(),
                    subject: award.subject_id().to_string(),
                })
            })?;

        let user = award.user().clone();
        let entry = self.ledger.entry(&user);
        if entry.repeats_award(award.subject_id(), *award.timestamp()) {
            debug!("Subject already awarded; ignoring replay");
            return Ok(AwardOutcome::Duplicate);
        }

        entry.history.push(HistoryRecord::Award {
            subject_id: award.subject_id().clone(),
            points,
            timestamp: *award.timestamp(),
            reason: award.reason().clone(),
            expires_at: *award.expires_at(),
            expired: false,
            revoked_at: None,
        });
        let total = entry.recompute();
        debug!(total, "Award recorded");

        let fired = self.fire_thresholds(&user, sink).await;
        Ok(AwardOutcome::Recorded { total, fired })
    }

    async fn fire_thresholds(&mut self, user: &UserId, sink: &dyn ActionSink) -> Vec<u32> {
        let entry = self.ledger.entry(user);
        let total = entry.points;
        let crossed: Vec<_> = self
            .policy
            .thresholds()
            .iter()
            .filter(|t| u64::from(t.points) <= total && !entry.fired.contains(&t.points))
            .cloned()
            .collect();

        let mut fired = Vec::with_capacity(crossed.len());
        for threshold in crossed {
            self.ledger.entry(user).fired.insert(threshold.points);
            fired.push(threshold.points);
            info!(user = %user, total, threshold = threshold.points, action = ?threshold.action, "Threshold reached");

            match threshold.action {
                ThresholdAction::NotifyMods => {
                    let report = NotifyReport {
                        user: user.clone(),
                        total,
                        threshold: threshold.points,
                        history: self.ledger.entry(user).current_interval().to_vec(),
                    };
                    if let Err(e) = sink.notify_mods(&report).await {
                        warn!(user = %user, error = %e, "Moderator notification failed");
                    }
                }
                ThresholdAction::BanUser { duration_days } => {
                    let reason = format!(
                        "Reached {} points (threshold {})",
                        total, threshold.points
                    );
                    let succeeded = match sink.ban_user(user, &reason, duration_days).await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(user = %user, error = %e, "Ban failed; threshold stays fired");
                            false
                        }
                    };
                    self.ledger.entry(user).history.push(HistoryRecord::Ban {
                        threshold: threshold.points,
                        timestamp: Utc::now(),
                        succeeded,
                    });
                }
            }
        }
        fired
    }

    /// Start a new interval for a user: zero points and clear fired thresholds.
    ///
    /// History is kept with a reset marker. Idempotent per `subject_id`;
    /// returns whether anything changed.
    #[instrument(skip(self, reason), fields(user = %user, subject_id = %subject_id))]
    pub fn reset(
        &mut self,
        user: &UserId,
        subject_id: &SubjectId,
        timestamp: DateTime<Utc>,
        reason: Option<String>,
    ) -> bool {
        let entry = self.ledger.entry(user);
        if entry.has_reset_for(subject_id) {
            return false;
        }
        entry.history.push(HistoryRecord::Reset {
            subject_id: subject_id.clone(),
            timestamp,
            reason,
        });
        entry.fired.clear();
        entry.recompute();
        info!("User reset");
        true
    }

    /// Cancel a user's award for a reapproved subject.
    ///
    /// Totals drop accordingly; fired thresholds stay fired. Returns whether
    /// an award was cancelled.
    #[instrument(skip(self), fields(user = %user, subject_id = %subject_id))]
    pub fn revoke(
        &mut self,
        user: &UserId,
        subject_id: &SubjectId,
        timestamp: DateTime<Utc>,
    ) -> bool {
        let Some(entry) = self.ledger.get_mut(user) else {
            return false;
        };
        let mut revoked = false;
        for record in entry.history.iter_mut().rev() {
            if let HistoryRecord::Award {
                subject_id: seen,
                revoked_at,
                ..
            } = record
                && seen == subject_id
                && revoked_at.is_none()
            {
                *revoked_at = Some(timestamp);
                revoked = true;
                break;
            }
        }
        if !revoked {
            return false;
        }
        let total = entry.recompute();
        info!(total, "Award cancelled by reapproval");
        true
    }

    /// Age out awards whose expiry is at or before `now`.
    ///
    /// Totals drop accordingly; fired thresholds stay fired. Returns the
    /// number of awards expired.
    #[instrument(skip(self))]
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let mut count = 0;
        for (user, entry) in self.ledger.entries_mut() {
            let mut changed = false;
            for record in entry.history.iter_mut() {
                if let HistoryRecord::Award {
                    expires_at: Some(at),
                    expired,
                    ..
                } = record
                {
                    if !*expired && *at <= now {
                        *expired = true;
                        changed = true;
                        count += 1;
                    }
                }
            }
            if changed {
                let total = entry.recompute();
                debug!(user = %user, total, "Expired awards");
            }
        }
        count
    }
}
