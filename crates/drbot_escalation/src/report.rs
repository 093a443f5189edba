//! Moderator notification content.

use crate::HistoryRecord;
use drbot_core::UserId;

/// What the moderators are told when a notify threshold fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyReport {
    /// User who crossed the threshold
    pub user: UserId,
    /// Points at the time of firing
    pub total: u64,
    /// Threshold that fired
    pub threshold: u32,
    /// Awards of the current interval, oldest first
    pub history: Vec<HistoryRecord>,
}

impl NotifyReport {
    /// Subject line.
    pub fn subject(&self) -> String {
        format!("Point alert for u/{}", self.user)
    }

    /// Markdown body listing the contributing history.
    ///
    /// # Examples
    ///
    /// ```
    /// use drbot_escalation::NotifyReport;
    /// use drbot_core::UserId;
    ///
    /// let report = NotifyReport {
    ///     user: UserId::new("spammer"),
    ///     total: 4,
    ///     threshold: 3,
    ///     history: vec![],
    /// };
    /// assert!(report.body().contains("reached 4 points"));
    /// ```
    pub fn body(&self) -> String {
        let mut body = format!(
            "u/{}'s violations have reached {} points and passed the {}-point threshold:\n\n",
            self.user, self.total, self.threshold
        );
        for record in &self.history {
            if let HistoryRecord::Award {
                subject_id,
                points,
                timestamp,
                reason,
                expired,
                revoked_at,
                ..
            } = record
            {
                let reason = reason.as_deref().unwrap_or("no removal reason");
                let status = if revoked_at.is_some() {
                    " (reapproved)"
                } else if *expired {
                    " (expired)"
                } else {
                    ""
                };
                body.push_str(&format!(
                    "- {} {}: {} point{}, {}{}\n",
                    timestamp.format("%Y-%m-%d"),
                    subject_id,
                    points,
                    if *points == 1 { "" } else { "s" },
                    reason,
                    status
                ));
            }
        }
        body
    }
}
