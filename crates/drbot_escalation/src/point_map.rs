//! Removal reason to point cost mapping.

use chrono::{DateTime, Months, Utc};
use drbot_error::{EscalationError, EscalationErrorKind, EscalationResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One configured removal reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointMapEntry {
    /// Exact removal reason title
    pub id: String,
    /// Points the reason costs
    pub points: u32,
    /// Months before the award expires, overriding the default (0 = never)
    #[serde(default)]
    pub expires: Option<u32>,
}

#[derive(Debug, Clone)]
struct ReasonPoints {
    points: u32,
    expires: Option<u32>,
}

/// Point cost and expiry per removal reason.
///
/// Unknown reasons cost zero points and use the default expiry.
#[derive(Debug, Clone)]
pub struct PointMap {
    reasons: HashMap<String, ReasonPoints>,
    default_expiration_months: u32,
    custom: Regex,
}

impl PointMap {
    /// Build a map; duplicate reason ids are logged and the last one wins.
    ///
    /// # Examples
    ///
    /// ```
    /// use drbot_escalation::{PointMap, PointMapEntry};
    ///
    /// let map = PointMap::new(
    ///     vec![PointMapEntry { id: "Spam".to_string(), points: 3, expires: Some(0) }],
    ///     6,
    /// )
    /// .unwrap();
    /// assert_eq!(map.points("Spam"), 3);
    /// assert_eq!(map.points("Unlisted"), 0);
    /// assert_eq!(map.expiration_months(Some("Spam")), None);
    /// assert_eq!(map.expiration_months(Some("Unlisted")), Some(6));
    /// ```
    pub fn new(
        entries: Vec<PointMapEntry>,
        default_expiration_months: u32,
    ) -> EscalationResult<Self> {
        let mut seen = HashSet::new();
        let duplicates: Vec<&str> = entries
            .iter()
            .filter(|entry| !seen.insert(entry.id.as_str()))
            .map(|entry| entry.id.as_str())
            .collect();
        if !duplicates.is_empty() {
            tracing::error!(
                ?duplicates,
                "Duplicate removal reason ids in point map; the last of each is used"
            );
        }

        let reasons = entries
            .into_iter()
            .map(|entry| {
                (
                    entry.id,
                    ReasonPoints {
                        points: entry.points,
                        expires: entry.expires,
                    },
                )
            })
            .collect();
        let custom = Regex::new(r"\[(\d+)\]").map_err(|e| {
            EscalationError::new(EscalationErrorKind::InvalidPointMap(e.to_string()))
        })?;

        Ok(Self {
            reasons,
            default_expiration_months,
            custom,
        })
    }

    /// Point cost of a removal reason.
    pub fn points(&self, reason: &str) -> u32 {
        match self.reasons.get(reason) {
            Some(entry) => entry.points,
            None => {
                tracing::debug!(reason, "Unknown removal reason, costs 0 points");
                0
            }
        }
    }

    /// Expiry in months for a reason; `None` means the award never expires.
    pub fn expiration_months(&self, reason: Option<&str>) -> Option<u32> {
        let months = reason
            .and_then(|r| self.reasons.get(r))
            .and_then(|entry| entry.expires)
            .unwrap_or(self.default_expiration_months);
        (months > 0).then_some(months)
    }

    /// When an award for `reason` made at `from` expires.
    pub fn expires_at(&self, reason: Option<&str>, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expiration_months(reason)
            .and_then(|months| from.checked_add_months(Months::new(months)))
    }

    /// Custom point override written as `[N]` in a moderator note.
    pub fn custom_points(&self, note: &str) -> Option<u32> {
        self.custom
            .captures(note)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}
