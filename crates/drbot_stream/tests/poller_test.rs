use chrono::{DateTime, Duration, TimeZone, Utc};
use drbot_core::{Checkpoint, EventKind, Payload, RawItem, RawItemBuilder, SubjectId};
use drbot_error::{ForumErrorKind, StreamErrorKind};
use drbot_interface::MemoryForum;
use drbot_storage::{CheckpointStore, MemoryCheckpointStore};
use drbot_stream::{EventPoller, StreamConfig};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;

fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minute)
}

fn removal(id: &str, author: &str, minute: i64) -> RawItem {
    let mut attributes = serde_json::Map::new();
    attributes.insert("removal_reason".to_string(), json!("Rule 1"));
    RawItemBuilder::default()
        .id(id)
        .author(author)
        .created_utc(at(minute))
        .attributes(attributes)
        .build()
        .unwrap()
}

fn fast_config() -> StreamConfig {
    StreamConfig::default()
        .with_backoff_base_ms(1)
        .with_backoff_max_secs(1)
}

fn poller(forum: &MemoryForum, store: &MemoryCheckpointStore, config: StreamConfig) -> EventPoller {
    EventPoller::new(
        EventKind::SubmissionRemoved,
        Arc::new(forum.clone()),
        Arc::new(store.clone()),
        config,
    )
}

fn ids(batch: &drbot_stream::Batch) -> Vec<String> {
    batch
        .events()
        .iter()
        .map(|e| e.subject_id().to_string())
        .collect()
}

#[tokio::test]
async fn test_first_poll_initializes_without_emitting() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    forum.push_item(EventKind::SubmissionRemoved, removal("t3_old1", "u", 0));
    forum.push_item(EventKind::SubmissionRemoved, removal("t3_old2", "u", 1));

    let mut poller = poller(&forum, &store, fast_config());
    poller.load_checkpoint().await.unwrap();
    let batch = poller.poll_once().await.unwrap();
    assert!(batch.events().is_empty());

    let saved = store.load(EventKind::SubmissionRemoved).await.unwrap().unwrap();
    assert_eq!(saved.last_id, Some(SubjectId::new("t3_old2")));

    forum.push_item(EventKind::SubmissionRemoved, removal("t3_new", "u", 2));
    let batch = poller.poll_once().await.unwrap();
    assert_eq!(ids(&batch), vec!["t3_new"]);
}

#[tokio::test]
async fn test_pages_back_to_checkpoint_and_yields_oldest_first() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    forum.push_item(EventKind::SubmissionRemoved, removal("a", "u", 0));

    let mut poller = poller(&forum, &store, fast_config().with_page_size(2));
    poller.load_checkpoint().await.unwrap();
    poller.poll_once().await.unwrap();

    for (i, id) in ["b", "c", "d", "e", "f"].iter().enumerate() {
        forum.push_item(EventKind::SubmissionRemoved, removal(id, "u", i as i64 + 1));
    }
    let batch = poller.poll_once().await.unwrap();
    assert_eq!(ids(&batch), vec!["b", "c", "d", "e", "f"]);

    let event = &batch.events()[0];
    match event.payload() {
        Payload::Removal(details) => assert_eq!(details.removal_reason.as_deref(), Some("Rule 1")),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[tokio::test]
async fn test_uncommitted_batch_is_redelivered() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    forum.push_item(EventKind::SubmissionRemoved, removal("a", "u", 0));
    let mut poller = poller(&forum, &store, fast_config());
    poller.load_checkpoint().await.unwrap();
    poller.poll_once().await.unwrap();

    forum.push_item(EventKind::SubmissionRemoved, removal("b", "u", 1));
    let first = poller.poll_once().await.unwrap();
    let again = poller.poll_once().await.unwrap();
    assert_eq!(ids(&first), ids(&again));

    poller.commit(&again).await.unwrap();
    assert!(poller.poll_once().await.unwrap().events().is_empty());
}

#[tokio::test]
async fn test_restart_resumes_from_persisted_checkpoint() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    forum.push_item(EventKind::SubmissionRemoved, removal("a", "u", 0));
    {
        let mut poller = poller(&forum, &store, fast_config());
        poller.load_checkpoint().await.unwrap();
        poller.poll_once().await.unwrap();
        forum.push_item(EventKind::SubmissionRemoved, removal("b", "u", 1));
        let batch = poller.poll_once().await.unwrap();
        poller.commit(&batch).await.unwrap();
    }

    forum.push_item(EventKind::SubmissionRemoved, removal("c", "u", 2));
    let mut restarted = poller(&forum, &store, fast_config());
    restarted.load_checkpoint().await.unwrap();
    let batch = restarted.poll_once().await.unwrap();
    assert_eq!(ids(&batch), vec!["c"]);
}

#[tokio::test]
async fn test_boundary_items_with_equal_timestamps() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let mut checkpoint = Checkpoint::default();
    checkpoint.advance(SubjectId::new("seen"), at(5), 10);
    checkpoint.advance(SubjectId::new("also_seen"), at(5), 10);
    store
        .save(EventKind::SubmissionRemoved, &checkpoint)
        .await
        .unwrap();

    forum.push_item(EventKind::SubmissionRemoved, removal("seen", "u", 5));
    forum.push_item(EventKind::SubmissionRemoved, removal("also_seen", "u", 5));
    forum.push_item(EventKind::SubmissionRemoved, removal("same_second", "u", 5));
    forum.push_item(EventKind::SubmissionRemoved, removal("later", "u", 6));

    let mut poller = poller(&forum, &store, fast_config());
    poller.load_checkpoint().await.unwrap();
    let batch = poller.poll_once().await.unwrap();
    assert_eq!(ids(&batch), vec!["same_second", "later"]);
}

#[tokio::test]
async fn test_own_items_skipped_but_consumed() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    forum.push_item(EventKind::SubmissionRemoved, removal("a", "u", 0));
    let mut poller = poller(&forum, &store, fast_config());
    poller.load_checkpoint().await.unwrap();
    poller.poll_once().await.unwrap();

    forum.push_item(EventKind::SubmissionRemoved, removal("mine", "drbot", 1));
    forum.push_item(EventKind::SubmissionRemoved, removal("theirs", "u", 2));
    let batch = poller.poll_once().await.unwrap();
    assert_eq!(ids(&batch), vec!["theirs"]);
    assert_eq!(batch.consumed(), 2);

    poller.commit(&batch).await.unwrap();
    assert_eq!(
        poller.checkpoint().last_id,
        Some(SubjectId::new("theirs"))
    );
    assert!(poller.checkpoint().has_seen(&SubjectId::new("mine")));
}

fn mod_action(id: &str, moderator: &str, action: &str, minute: i64) -> RawItem {
    let mut attributes = serde_json::Map::new();
    attributes.insert("action".to_string(), json!(action));
    attributes.insert("target_author".to_string(), json!("spammer"));
    RawItemBuilder::default()
        .id(id)
        .author(moderator)
        .created_utc(at(minute))
        .attributes(attributes)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_own_bans_reach_the_mod_log_stream() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let mut poller = EventPoller::new(
        EventKind::ModAction,
        Arc::new(forum.clone()),
        Arc::new(store.clone()),
        fast_config(),
    );
    poller.load_checkpoint().await.unwrap();
    poller.poll_once().await.unwrap();

    forum.push_item(EventKind::ModAction, mod_action("ml_1", "DrBot", "removelink", 1));
    forum.push_item(EventKind::ModAction, mod_action("ml_2", "DrBot", "banuser", 2));
    forum.push_item(EventKind::ModAction, mod_action("ml_3", "a_mod", "removelink", 3));
    let batch = poller.poll_once().await.unwrap();
    assert_eq!(ids(&batch), vec!["ml_2", "ml_3"]);
    assert_eq!(batch.consumed(), 3);
    assert_eq!(batch.events()[0].author_id().as_str(), "spammer");
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    forum.push_item(EventKind::SubmissionRemoved, removal("a", "u", 0));
    let mut poller = poller(&forum, &store, fast_config());
    poller.load_checkpoint().await.unwrap();
    poller.poll_once().await.unwrap();

    forum.push_item(EventKind::SubmissionRemoved, removal("b", "u", 1));
    forum.fail_next_fetches(
        EventKind::SubmissionRemoved,
        2,
        ForumErrorKind::Transient("503".to_string()),
    );
    let before = forum.fetch_calls(EventKind::SubmissionRemoved);
    let batch = poller.poll_once().await.unwrap();
    assert_eq!(ids(&batch), vec!["b"]);
    assert_eq!(forum.fetch_calls(EventKind::SubmissionRemoved) - before, 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_pause_the_stream() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    forum.push_item(EventKind::SubmissionRemoved, removal("a", "u", 0));
    let mut poller = poller(&forum, &store, fast_config().with_max_fetch_attempts(3));
    poller.load_checkpoint().await.unwrap();
    poller.poll_once().await.unwrap();

    forum.push_item(EventKind::SubmissionRemoved, removal("b", "u", 1));
    forum.fail_next_fetches(
        EventKind::SubmissionRemoved,
        3,
        ForumErrorKind::RateLimited(1),
    );
    let err = poller.poll_once().await.unwrap_err();
    assert!(err.is_recoverable());
    assert!(matches!(
        err.kind,
        StreamErrorKind::TransientFetch { attempts: 3, .. }
    ));

    // Next cycle the stream picks up where it left off
    let batch = poller.poll_once().await.unwrap();
    assert_eq!(ids(&batch), vec!["b"]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_delays_double_from_the_base() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let config = StreamConfig::default()
        .with_backoff_base_ms(100)
        .with_backoff_max_secs(30)
        .with_max_fetch_attempts(3);
    let mut poller = poller(&forum, &store, config);
    poller.load_checkpoint().await.unwrap();
    forum.fail_next_fetches(
        EventKind::SubmissionRemoved,
        2,
        ForumErrorKind::Transient("503".to_string()),
    );

    let started = tokio::time::Instant::now();
    poller.poll_once().await.unwrap();
    let waited = started.elapsed();

    // 200ms then 400ms, each jittered by 0.5x..1.5x
    assert!(waited >= std::time::Duration::from_millis(300), "{waited:?}");
    assert!(waited <= std::time::Duration::from_millis(900), "{waited:?}");
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_waits_for_the_quota_window() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let mut poller = poller(&forum, &store, fast_config());
    poller.load_checkpoint().await.unwrap();
    forum.fail_next_fetches(
        EventKind::SubmissionRemoved,
        1,
        ForumErrorKind::RateLimited(20),
    );

    let started = tokio::time::Instant::now();
    poller.poll_once().await.unwrap();
    assert!(started.elapsed() >= std::time::Duration::from_secs(20));
    assert_eq!(forum.fetch_calls(EventKind::SubmissionRemoved), 2);
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    forum.fail_next_fetches(
        EventKind::SubmissionRemoved,
        1,
        ForumErrorKind::Forbidden("no access".to_string()),
    );
    let mut poller = poller(&forum, &store, fast_config());
    poller.load_checkpoint().await.unwrap();

    let err = poller.poll_once().await.unwrap_err();
    assert!(!err.is_recoverable());
    assert_eq!(forum.fetch_calls(EventKind::SubmissionRemoved), 1);
}

#[tokio::test(start_paused = true)]
async fn test_event_stream_commits_after_handoff() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let mut checkpoint = Checkpoint::default();
    checkpoint.advance(SubjectId::new("a"), at(0), 10);
    store
        .save(EventKind::SubmissionRemoved, &checkpoint)
        .await
        .unwrap();
    forum.push_item(EventKind::SubmissionRemoved, removal("a", "u", 0));
    forum.push_item(EventKind::SubmissionRemoved, removal("b", "u", 1));
    forum.push_item(EventKind::SubmissionRemoved, removal("c", "u", 2));

    let mut poller = poller(&forum, &store, fast_config());
    poller.load_checkpoint().await.unwrap();
    let mut events = Box::pin(poller.events());

    let first = events.next().await.unwrap().unwrap();
    let second = events.next().await.unwrap().unwrap();
    assert_eq!(first.subject_id().as_str(), "b");
    assert_eq!(second.subject_id().as_str(), "c");

    // Not committed until the consumer comes back for more
    let saved = store.load(EventKind::SubmissionRemoved).await.unwrap().unwrap();
    assert_eq!(saved.last_id, Some(SubjectId::new("a")));

    let waited = tokio::time::timeout(std::time::Duration::from_millis(10), events.next()).await;
    assert!(waited.is_err());
    let saved = store.load(EventKind::SubmissionRemoved).await.unwrap().unwrap();
    assert_eq!(saved.last_id, Some(SubjectId::new("c")));
}
