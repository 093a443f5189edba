use chrono::{TimeZone, Utc};
use drbot_core::{
    Checkpoint, EventBuilder, EventKind, ModActionDetails, Payload, RemovalDetails, SubjectId,
    UserId,
};
use strum::IntoEnumIterator;

#[test]
fn test_event_kind_round_trips_through_str() {
    for kind in EventKind::iter() {
        let parsed: EventKind = kind.as_str().parse().unwrap();
        assert_eq!(parsed, kind);
        assert_eq!(format!("{}", kind), kind.as_str());
    }
    assert!("wiki_edit".parse::<EventKind>().is_err());
}

#[test]
fn test_event_kind_serde_uses_snake_case() {
    let json = serde_json::to_string(&EventKind::SubmissionRemoved).unwrap();
    assert_eq!(json, "\"submission_removed\"");
}

#[test]
fn test_acting_moderator_from_payload() {
    let removal = EventBuilder::default()
        .kind(EventKind::SubmissionRemoved)
        .subject_id("t3_x")
        .author_id("someone")
        .timestamp(Utc::now())
        .payload(Payload::Removal(RemovalDetails {
            moderator: Some("mod_a".to_string()),
            ..Default::default()
        }))
        .build()
        .unwrap();
    assert_eq!(removal.acting_moderator(), Some("mod_a"));

    let action = EventBuilder::default()
        .kind(EventKind::ModAction)
        .subject_id("ModAction_1")
        .author_id("target")
        .timestamp(Utc::now())
        .payload(Payload::ModAction(ModActionDetails {
            action: "banuser".to_string(),
            moderator: "mod_b".to_string(),
            ..Default::default()
        }))
        .build()
        .unwrap();
    assert_eq!(action.acting_moderator(), Some("mod_b"));
}

#[test]
fn test_event_builder_requires_subject() {
    let result = EventBuilder::default()
        .kind(EventKind::CommentRemoved)
        .author_id("someone")
        .timestamp(Utc::now())
        .build();
    assert!(result.is_err());
}

#[test]
fn test_deleted_user_placeholder() {
    assert!(UserId::new("[deleted]").is_deleted());
    assert!(!UserId::new("deleted").is_deleted());
    assert!(UserId::new("AutoModerator").matches("automoderator"));
}

#[test]
fn test_checkpoint_keeps_newest_timestamp() {
    let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

    let mut checkpoint = Checkpoint::default();
    assert!(checkpoint.is_empty());
    checkpoint.advance(SubjectId::new("b"), late, 10);
    checkpoint.advance(SubjectId::new("a"), early, 10);

    assert_eq!(checkpoint.last_id, Some(SubjectId::new("b")));
    assert_eq!(checkpoint.last_timestamp, Some(late));
    assert!(checkpoint.has_seen(&SubjectId::new("a")));
    assert!(!checkpoint.has_seen(&SubjectId::new("c")));
}

#[test]
fn test_checkpoint_serializes_with_defaults() {
    let checkpoint: Checkpoint = serde_json::from_str("{}").unwrap();
    assert!(checkpoint.is_empty());
}
