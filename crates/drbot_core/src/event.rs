//! Normalized moderation events.

use crate::{EventKind, Payload, SubjectId, UserId};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// An immutable, normalized moderation event.
///
/// Events are produced by the poller and handed to every subscribed Botling.
/// `subject_id` is unique per stream and serves as the deduplication key.
///
/// # Examples
///
/// ```
/// use drbot_core::{EventBuilder, EventKind, Payload, RemovalDetails};
/// use chrono::Utc;
///
/// let event = EventBuilder::default()
///     .kind(EventKind::CommentRemoved)
///     .subject_id("t1_abc")
///     .author_id("spammer")
///     .timestamp(Utc::now())
///     .payload(Payload::Removal(RemovalDetails::default()))
///     .build()
///     .unwrap();
///
/// assert_eq!(event.subject_id().as_str(), "t1_abc");
/// ```
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct Event {
    /// Stream the event came from
    kind: EventKind,
    /// Unique, stable id of the subject
    subject_id: SubjectId,
    /// Author of the subject (for mod actions: the target author when known)
    author_id: UserId,
    /// When the subject was created or the action was taken
    timestamp: DateTime<Utc>,
    /// Kind-specific attributes
    #[builder(default)]
    payload: Payload,
}

impl Event {
    /// Moderator responsible for the event, when the payload names one.
    pub fn acting_moderator(&self) -> Option<&str> {
        match &self.payload {
            Payload::Removal(details) => details.moderator.as_deref(),
            Payload::ModAction(details) => Some(details.moderator.as_str()),
            _ => None,
        }
    }
}
