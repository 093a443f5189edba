//! Event kind enumeration.

use serde::{Deserialize, Serialize};

/// Kind of moderation event a stream produces.
///
/// # Examples
///
/// ```
/// use drbot_core::EventKind;
///
/// let kind: EventKind = "comment_removed".parse().unwrap();
/// assert_eq!(kind, EventKind::CommentRemoved);
/// assert_eq!(format!("{}", kind), "comment_removed");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// New submission appeared
    #[display("submission_created")]
    SubmissionCreated,
    /// Submission removed by a moderator
    #[display("submission_removed")]
    SubmissionRemoved,
    /// New comment appeared
    #[display("comment_created")]
    CommentCreated,
    /// Comment removed by a moderator
    #[display("comment_removed")]
    CommentRemoved,
    /// Mod log entry
    #[display("mod_action")]
    ModAction,
    /// Modmail message
    #[display("modmail_message")]
    ModmailMessage,
    /// User flair changed
    #[display("flair_change")]
    FlairChange,
}

impl EventKind {
    /// Stable string form, used in storage paths and configuration keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SubmissionCreated => "submission_created",
            EventKind::SubmissionRemoved => "submission_removed",
            EventKind::CommentCreated => "comment_created",
            EventKind::CommentRemoved => "comment_removed",
            EventKind::ModAction => "mod_action",
            EventKind::ModmailMessage => "modmail_message",
            EventKind::FlairChange => "flair_change",
        }
    }

    /// Whether events of this kind are removals.
    pub fn is_removal(&self) -> bool {
        matches!(self, EventKind::SubmissionRemoved | EventKind::CommentRemoved)
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submission_created" => Ok(EventKind::SubmissionCreated),
            "submission_removed" => Ok(EventKind::SubmissionRemoved),
            "comment_created" => Ok(EventKind::CommentCreated),
            "comment_removed" => Ok(EventKind::CommentRemoved),
            "mod_action" => Ok(EventKind::ModAction),
            "modmail_message" => Ok(EventKind::ModmailMessage),
            "flair_change" => Ok(EventKind::FlairChange),
            _ => Err(format!("Unknown event kind: {}", s)),
        }
    }
}
