//! Raw listing item to event conversion.

use drbot_core::{
    Event, EventBuilder, EventKind, FlairDetails, ModActionDetails, ModmailDetails, Payload,
    RawItem, RemovalDetails,
};

fn owned(item: &RawItem, name: &str) -> Option<String> {
    item.attr_str(name)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Turn a raw item of stream `kind` into an [`Event`].
///
/// Fails when the item lacks an attribute its kind requires.
pub fn normalize(kind: EventKind, item: &RawItem) -> Result<Event, String> {
    let (author, payload) = match kind {
        EventKind::SubmissionRemoved | EventKind::CommentRemoved => (
            item.author().clone(),
            Payload::Removal(RemovalDetails {
                removal_reason: owned(item, "removal_reason"),
                mod_note: owned(item, "mod_note"),
                moderator: owned(item, "banned_by").or_else(|| owned(item, "moderator")),
                title: owned(item, "title"),
                permalink: owned(item, "permalink"),
            }),
        ),
        EventKind::ModAction => {
            let action = owned(item, "action")
                .ok_or_else(|| format!("mod action {} has no action", item.id()))?;
            let target_author = owned(item, "target_author");
            (
                target_author
                    .clone()
                    .unwrap_or_else(|| item.author().clone()),
                Payload::ModAction(ModActionDetails {
                    action,
                    moderator: item.author().clone(),
                    target_author,
                    target_id: owned(item, "target_fullname"),
                    details: owned(item, "details"),
                    description: owned(item, "description"),
                }),
            )
        }
        EventKind::ModmailMessage => (
            item.author().clone(),
            Payload::Modmail(ModmailDetails {
                conversation_id: owned(item, "conversation_id")
                    .unwrap_or_else(|| item.id().clone()),
                subject: owned(item, "subject"),
                body: owned(item, "body").unwrap_or_default(),
            }),
        ),
        EventKind::FlairChange => (
            item.author().clone(),
            Payload::Flair(FlairDetails {
                flair_text: owned(item, "flair_text"),
                css_class: owned(item, "css_class"),
            }),
        ),
        EventKind::SubmissionCreated | EventKind::CommentCreated => {
            (item.author().clone(), Payload::Other(item.attributes().clone()))
        }
    };

    EventBuilder::default()
        .kind(kind)
        .subject_id(item.id().as_str())
        .author_id(author)
        .timestamp(*item.created_utc())
        .payload(payload)
        .build()
        .map_err(|e| e.to_string())
}
