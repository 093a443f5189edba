use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use drbot_core::{SubjectId, UserId};
use drbot_error::{EscalationErrorKind, ForumError, ForumErrorKind, ForumResult};
use drbot_escalation::{
    ActionSink, Award, AwardOutcome, EscalationEngine, ForumActions, HistoryRecord, Ledger,
    NotifyReport, PointMap, PointMapEntry, Threshold, ThresholdAction, ThresholdPolicy,
};
use drbot_interface::MemoryForum;
use std::sync::{Arc, Mutex};

/// Records every action in call order.
#[derive(Default)]
struct RecordingSink {
    calls: Mutex<Vec<String>>,
    fail_bans: bool,
}

impl RecordingSink {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionSink for RecordingSink {
    async fn notify_mods(&self, report: &NotifyReport) -> ForumResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("notify:{}:{}", report.user, report.threshold));
        Ok(())
    }

    async fn ban_user(
        &self,
        user: &UserId,
        _reason: &str,
        _duration_days: Option<u32>,
    ) -> ForumResult<()> {
        self.calls.lock().unwrap().push(format!("ban:{}", user));
        if self.fail_bans {
            return Err(ForumError::new(ForumErrorKind::BanFailed {
                user: user.to_string(),
                reason: "already banned".to_string(),
            }));
        }
        Ok(())
    }
}

fn notify_then_ban() -> ThresholdPolicy {
    ThresholdPolicy::new(vec![
        Threshold::new(3, ThresholdAction::NotifyMods),
        Threshold::new(5, ThresholdAction::BanUser { duration_days: None }),
    ])
    .unwrap()
}

#[tokio::test]
async fn test_notify_then_ban_scenario() {
    let sink = RecordingSink::default();
    let mut engine = EscalationEngine::new(notify_then_ban());

    let first = engine.award(Award::new("u", "r1", 2), &sink).await.unwrap();
    assert_eq!(first, AwardOutcome::Recorded { total: 2, fired: vec![] });

    let second = engine.award(Award::new("u", "r2", 2), &sink).await.unwrap();
    assert_eq!(second, AwardOutcome::Recorded { total: 4, fired: vec![3] });

    let third = engine.award(Award::new("u", "r3", 2), &sink).await.unwrap();
    assert_eq!(third, AwardOutcome::Recorded { total: 6, fired: vec![5] });

    assert_eq!(sink.calls(), vec!["notify:u:3", "ban:u"]);
}

#[tokio::test]
async fn test_jump_past_two_thresholds_fires_both_in_order() {
    let sink = RecordingSink::default();
    let mut engine = EscalationEngine::new(notify_then_ban());

    let outcome = engine.award(Award::new("u", "big", 7), &sink).await.unwrap();
    assert_eq!(outcome, AwardOutcome::Recorded { total: 7, fired: vec![3, 5] });
    assert_eq!(sink.calls(), vec!["notify:u:3", "ban:u"]);

    engine.award(Award::new("u", "more", 1), &sink).await.unwrap();
    assert_eq!(sink.calls().len(), 2);
}

#[tokio::test]
async fn test_duplicate_subject_changes_nothing() {
    let sink = RecordingSink::default();
    let mut engine = EscalationEngine::new(notify_then_ban());
    engine.award(Award::new("u", "r1", 4), &sink).await.unwrap();
    let before = engine.ledger().clone();

    let replay = engine.award(Award::new("u", "r1", 4), &sink).await.unwrap();
    assert_eq!(replay, AwardOutcome::Duplicate);
    assert_eq!(engine.ledger(), &before);
    assert_eq!(sink.calls(), vec!["notify:u:3"]);
}

#[tokio::test]
async fn test_replaying_stream_reproduces_ledger() {
    let awards = vec![
        Award::new("a", "s1", 2),
        Award::new("b", "s2", 1),
        Award::new("a", "s3", 2),
        Award::new("a", "s4", 2),
    ];

    let sink = RecordingSink::default();
    let mut uninterrupted = EscalationEngine::new(notify_then_ban());
    for award in awards.clone() {
        uninterrupted.award(award, &sink).await.unwrap();
    }

    // Crash after two awards, restart from the persisted ledger, replay everything
    let mut crashed = EscalationEngine::new(notify_then_ban());
    for award in awards.iter().take(2).cloned() {
        crashed.award(award, &sink).await.unwrap();
    }
    let persisted: Ledger =
        serde_json::from_str(&serde_json::to_string(crashed.ledger()).unwrap()).unwrap();
    let mut restarted = EscalationEngine::with_ledger(notify_then_ban(), persisted);
    for award in awards {
        restarted.award(award, &sink).await.unwrap();
    }

    let user_a = UserId::new("a");
    let ledger = restarted.ledger().get(&user_a).unwrap();
    let reference = uninterrupted.ledger().get(&user_a).unwrap();
    assert_eq!(ledger.points, reference.points);
    assert_eq!(ledger.fired, reference.fired);
    assert_eq!(restarted.points(&UserId::new("b")), 1);
}

#[tokio::test]
async fn test_non_positive_awards_rejected() {
    let sink = RecordingSink::default();
    let mut engine = EscalationEngine::new(notify_then_ban());

    for points in [0, -3] {
        let err = engine
            .award(Award::new("u", "r", points), &sink)
            .await
            .unwrap_err();
        assert!(matches!(err.kind, EscalationErrorKind::InvalidAward { .. }));
    }
    assert!(engine.ledger().is_empty());
}

#[tokio::test]
async fn test_failed_ban_still_marks_threshold_fired() {
    let sink = RecordingSink {
        fail_bans: true,
        ..Default::default()
    };
    let mut engine = EscalationEngine::new(notify_then_ban());
    engine.award(Award::new("u", "r1", 6), &sink).await.unwrap();
    engine.award(Award::new("u", "r2", 1), &sink).await.unwrap();

    let calls = sink.calls();
    assert_eq!(calls.iter().filter(|c| c.starts_with("ban")).count(), 1);

    let entry = engine.ledger().get(&UserId::new("u")).unwrap();
    assert!(entry.fired.contains(&5));
    assert!(entry.history.iter().any(|r| matches!(
        r,
        HistoryRecord::Ban {
            threshold: 5,
            succeeded: false,
            ..
        }
    )));
}

#[tokio::test]
async fn test_empty_policy_is_a_tally() {
    let sink = RecordingSink::default();
    let mut engine = EscalationEngine::new(ThresholdPolicy::default());
    engine.award(Award::new("u", "r1", 50), &sink).await.unwrap();
    assert_eq!(engine.points(&UserId::new("u")), 50);
    assert!(sink.calls().is_empty());
}

#[tokio::test]
async fn test_reset_starts_new_interval() {
    let sink = RecordingSink::default();
    let mut engine = EscalationEngine::new(notify_then_ban());
    let user = UserId::new("u");
    engine.award(Award::new("u", "r1", 4), &sink).await.unwrap();

    let ban_log = SubjectId::new("ModAction_ban");
    assert!(engine.reset(&user, &ban_log, Utc::now(), Some("banned".to_string())));
    assert!(!engine.reset(&user, &ban_log, Utc::now(), None));
    assert_eq!(engine.points(&user), 0);

    // Replay of an award from before the reset is still a duplicate
    let replay = engine.award(Award::new("u", "r1", 4), &sink).await.unwrap();
    assert_eq!(replay, AwardOutcome::Duplicate);

    // New violations can fire the same threshold again
    engine.award(Award::new("u", "r2", 3), &sink).await.unwrap();
    assert_eq!(sink.calls(), vec!["notify:u:3", "notify:u:3"]);
    assert_eq!(engine.ledger().get(&user).unwrap().history.len(), 3);
}

#[tokio::test]
async fn test_revoke_cancels_one_award() {
    let sink = RecordingSink::default();
    let mut engine = EscalationEngine::new(notify_then_ban());
    let user = UserId::new("u");
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let removed = Award::new("u", "r1", 2).with_timestamp(start);
    engine.award(removed.clone(), &sink).await.unwrap();
    engine
        .award(Award::new("u", "r2", 2).with_timestamp(start), &sink)
        .await
        .unwrap();

    let approved_at = start + Duration::hours(1);
    let r1 = SubjectId::new("r1");
    assert!(engine.revoke(&user, &r1, approved_at));
    assert!(!engine.revoke(&user, &r1, approved_at));
    assert!(!engine.revoke(&UserId::new("stranger"), &r1, approved_at));
    assert_eq!(engine.points(&user), 2);
    assert!(engine.ledger().get(&user).unwrap().fired.contains(&3));

    let replay = engine.award(removed, &sink).await.unwrap();
    assert_eq!(replay, AwardOutcome::Duplicate);

    let removed_again = Award::new("u", "r1", 2).with_timestamp(approved_at + Duration::hours(1));
    let outcome = engine.award(removed_again, &sink).await.unwrap();
    assert_eq!(outcome, AwardOutcome::Recorded { total: 4, fired: vec![] });
}

#[tokio::test]
async fn test_expiry_lowers_total_but_keeps_fired() {
    let sink = RecordingSink::default();
    let mut engine = EscalationEngine::new(notify_then_ban());
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let map = PointMap::new(vec![], 6).unwrap();

    let old = Award::new("u", "r1", 3)
        .with_timestamp(start)
        .with_expires_at(map.expires_at(None, start));
    engine.award(old, &sink).await.unwrap();
    let recent = Award::new("u", "r2", 1).with_timestamp(start + Duration::days(150));
    engine.award(recent, &sink).await.unwrap();

    assert_eq!(engine.expire(start + Duration::days(100)), 0);
    assert_eq!(engine.expire(start + Duration::days(200)), 1);
    assert_eq!(engine.points(&UserId::new("u")), 1);
    assert!(engine.ledger().get(&UserId::new("u")).unwrap().fired.contains(&3));

    // Already-expired awards are not counted twice
    assert_eq!(engine.expire(start + Duration::days(400)), 0);
}

#[tokio::test]
async fn test_forum_actions_use_forum_collaborator() {
    let forum = MemoryForum::new("DrBot");
    let actions = ForumActions::new(Arc::new(forum.clone()), false);
    let mut engine = EscalationEngine::new(
        ThresholdPolicy::new(vec![
            Threshold::new(2, ThresholdAction::NotifyMods),
            Threshold::new(4, ThresholdAction::BanUser { duration_days: Some(7) }),
        ])
        .unwrap(),
    );

    engine
        .award(Award::new("u", "r1", 5).with_reason(Some("Spam".to_string())), &actions)
        .await
        .unwrap();

    let messages = forum.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].subject, "Point alert for u/u");
    assert!(messages[0].body.contains("Spam"));
    assert_eq!(forum.bans()[0].duration_days, Some(7));
}

#[tokio::test]
async fn test_dry_run_actions_touch_nothing() {
    let forum = MemoryForum::new("DrBot");
    let actions = ForumActions::new(Arc::new(forum.clone()), true);
    let mut engine = EscalationEngine::new(notify_then_ban());
    engine.award(Award::new("u", "r1", 9), &actions).await.unwrap();

    assert!(forum.messages().is_empty());
    assert!(forum.bans().is_empty());
    assert!(engine.ledger().get(&UserId::new("u")).unwrap().fired.contains(&5));
}

#[test]
fn test_point_map_lookup_and_overrides() {
    let map = PointMap::new(
        vec![
            PointMapEntry {
                id: "Spam".to_string(),
                points: 3,
                expires: None,
            },
            PointMapEntry {
                id: "Spam".to_string(),
                points: 5,
                expires: Some(2),
            },
            PointMapEntry {
                id: "Off topic".to_string(),
                points: 1,
                expires: Some(0),
            },
        ],
        6,
    )
    .unwrap();

    assert_eq!(map.points("Spam"), 5);
    assert_eq!(map.expiration_months(Some("Spam")), Some(2));
    assert_eq!(map.expiration_months(Some("Off topic")), None);
    assert_eq!(map.points("Unknown"), 0);
    assert_eq!(map.custom_points("lenient [0] this time"), Some(0));
    assert_eq!(map.custom_points("worth [12]"), Some(12));
    assert_eq!(map.custom_points("no override"), None);
}

#[test]
fn test_policy_rejects_bad_thresholds() {
    assert!(ThresholdPolicy::new(vec![Threshold::new(0, ThresholdAction::NotifyMods)]).is_err());
    assert!(
        ThresholdPolicy::new(vec![
            Threshold::new(5, ThresholdAction::NotifyMods),
            Threshold::new(3, ThresholdAction::NotifyMods),
        ])
        .is_err()
    );

    let parsed: ThresholdPolicy = serde_json::from_str(
        r#"[{"points": 3, "action": "notify_mods"}, {"points": 6, "action": "ban_user", "duration_days": 30}]"#,
    )
    .unwrap();
    assert_eq!(
        parsed.thresholds()[1].action,
        ThresholdAction::BanUser {
            duration_days: Some(30)
        }
    );
    assert!(serde_json::from_str::<ThresholdPolicy>(r#"[{"points": 0, "action": "notify_mods"}]"#).is_err());
}
