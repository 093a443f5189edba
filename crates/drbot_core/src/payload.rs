//! Kind-specific event attributes.

use serde::{Deserialize, Serialize};

/// Attributes of a removed submission or comment.
///
/// `removal_reason` may legitimately be absent: re-approving then re-removing
/// an item on the forum erases the reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalDetails {
    /// Removal reason title chosen by the moderator
    #[serde(default)]
    pub removal_reason: Option<String>,
    /// Free-text moderator note attached to the removal
    #[serde(default)]
    pub mod_note: Option<String>,
    /// Moderator who removed the item
    #[serde(default)]
    pub moderator: Option<String>,
    /// Submission title or comment excerpt
    #[serde(default)]
    pub title: Option<String>,
    /// Link to the removed item
    #[serde(default)]
    pub permalink: Option<String>,
}

/// Attributes of a mod log entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModActionDetails {
    /// Action name as the mod log reports it (`banuser`, `removelink`, ...)
    pub action: String,
    /// Acting moderator
    pub moderator: String,
    /// Author of the target item, if any
    #[serde(default)]
    pub target_author: Option<String>,
    /// Fullname of the target item, if any
    #[serde(default)]
    pub target_id: Option<String>,
    /// Short details field (ban duration, removal reason title)
    #[serde(default)]
    pub details: Option<String>,
    /// Longer description field
    #[serde(default)]
    pub description: Option<String>,
}

/// Attributes of a modmail message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModmailDetails {
    /// Conversation the message belongs to
    pub conversation_id: String,
    /// Conversation subject
    #[serde(default)]
    pub subject: Option<String>,
    /// Message body in markdown
    #[serde(default)]
    pub body: String,
}

/// Attributes of a flair change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlairDetails {
    /// New flair text
    #[serde(default)]
    pub flair_text: Option<String>,
    /// New flair CSS class
    #[serde(default)]
    pub css_class: Option<String>,
}

/// Kind-specific attributes carried by an [`Event`](crate::Event).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Submission or comment removal
    Removal(RemovalDetails),
    /// Mod log entry
    ModAction(ModActionDetails),
    /// Modmail message
    Modmail(ModmailDetails),
    /// Flair change
    Flair(FlairDetails),
    /// Anything else, kept as raw attributes
    Other(serde_json::Map<String, serde_json::Value>),
}

impl Payload {
    /// Removal attributes, if this is a removal.
    pub fn as_removal(&self) -> Option<&RemovalDetails> {
        match self {
            Payload::Removal(details) => Some(details),
            _ => None,
        }
    }

    /// Mod log attributes, if this is a mod action.
    pub fn as_mod_action(&self) -> Option<&ModActionDetails> {
        match self {
            Payload::ModAction(details) => Some(details),
            _ => None,
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Other(serde_json::Map::new())
    }
}
