use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use drbot::{DrBot, DrbotConfig, ShutdownHandle};
use drbot_botling::{Botling, BotlingContext};
use drbot_core::{Event, EventKind, RawItem, RawItemBuilder};
use drbot_error::{BotlingResult, ForumErrorKind};
use drbot_interface::MemoryForum;
use drbot_storage::{CheckpointStore, MemoryCheckpointStore};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const POINTLING_CONFIG: &str = r#"
[botlings.Pointling]
thresholds = [{ points = 3, action = "notify_mods" }, { points = 5, action = "ban_user" }]
point_map = [{ id = "Spam", points = 2 }]

[streams.mod_action]
max_fetch_attempts = 2
backoff_base_ms = 1
backoff_max_secs = 1
"#;

fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + ChronoDuration::minutes(minute)
}

fn removal(id: &str, author: &str, minute: i64) -> RawItem {
    let mut attributes = serde_json::Map::new();
    attributes.insert("removal_reason".to_string(), json!("Spam"));
    RawItemBuilder::default()
        .id(id)
        .author(author)
        .created_utc(at(minute))
        .attributes(attributes)
        .build()
        .unwrap()
}

fn later(start: Instant, cycles: u64) -> Instant {
    start + Duration::from_secs(61 * cycles)
}

async fn start(
    forum: &MemoryForum,
    store: &MemoryCheckpointStore,
    config: &DrbotConfig,
    botlings: Vec<Box<dyn Botling>>,
) -> DrBot {
    DrBot::start(
        Arc::new(forum.clone()),
        Arc::new(store.clone()),
        config,
        botlings,
    )
    .await
    .unwrap()
}

type Seen = Arc<Mutex<Vec<String>>>;

struct Recorder {
    seen: Seen,
}

#[async_trait]
impl Botling for Recorder {
    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::SubmissionRemoved, EventKind::CommentRemoved]
    }

    async fn setup(&mut self, _ctx: BotlingContext) -> BotlingResult<()> {
        Ok(())
    }

    async fn handle(&mut self, event: &Event) -> BotlingResult<()> {
        self.seen.lock().unwrap().push(event.subject_id().to_string());
        Ok(())
    }
}

struct NeverStarts;

#[async_trait]
impl Botling for NeverStarts {
    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::FlairChange]
    }

    async fn setup(&mut self, _ctx: BotlingContext) -> BotlingResult<()> {
        Err(drbot_error::BotlingError::handler("no credentials"))
    }

    async fn handle(&mut self, _event: &Event) -> BotlingResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_removals_escalate_through_the_loop() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let config = DrbotConfig::from_toml(POINTLING_CONFIG).unwrap();
    let mut bot = start(&forum, &store, &config, drbot::default_botlings()).await;

    assert_eq!(
        bot.stream_kinds(),
        vec![
            EventKind::SubmissionRemoved,
            EventKind::CommentRemoved,
            EventKind::ModAction
        ]
    );

    let t0 = Instant::now();
    let first = bot.run_cycle(t0).await;
    assert_eq!(first.polled.len(), 3);
    assert_eq!(first.dispatched, 0);

    forum.push_item(EventKind::CommentRemoved, removal("t1_1", "U", 1));
    forum.push_item(EventKind::CommentRemoved, removal("t1_2", "U", 2));
    forum.push_item(EventKind::CommentRemoved, removal("t1_3", "U", 3));

    // Streams are not due yet
    let early = bot.run_cycle(t0 + Duration::from_secs(10)).await;
    assert!(early.polled.is_empty());

    let report = bot.run_cycle(later(t0, 1)).await;
    assert_eq!(report.dispatched, 3);
    assert_eq!(report.failed_deliveries, 0);
    assert!(report.flushed);
    assert_eq!(forum.messages().len(), 1);
    assert_eq!(forum.bans().len(), 1);
    assert!(forum.document("drbot/Pointling").is_some());

    let checkpoint = store.load(EventKind::CommentRemoved).await.unwrap().unwrap();
    assert_eq!(checkpoint.last_id.as_ref().map(|id| id.to_string()), Some("t1_3".to_string()));

    let quiet = bot.run_cycle(later(t0, 2)).await;
    assert_eq!(quiet.dispatched, 0);
    assert_eq!(forum.messages().len(), 1);
}

#[tokio::test]
async fn test_restart_resumes_after_checkpoint() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let config = DrbotConfig::from_toml(POINTLING_CONFIG).unwrap();

    let mut bot = start(&forum, &store, &config, drbot::default_botlings()).await;
    let t0 = Instant::now();
    bot.run_cycle(t0).await;
    forum.push_item(EventKind::CommentRemoved, removal("t1_1", "U", 1));
    bot.run_cycle(later(t0, 1)).await;
    bot.stop().await.unwrap();
    drop(bot);

    forum.push_item(EventKind::CommentRemoved, removal("t1_2", "U", 2));
    let mut restarted = start(&forum, &store, &config, drbot::default_botlings()).await;
    let report = restarted.run_cycle(Instant::now()).await;
    assert_eq!(report.dispatched, 1);

    // 2 + 2 points crosses the notify threshold exactly once
    assert_eq!(forum.messages().len(), 1);
    assert!(forum.bans().is_empty());
}

#[tokio::test]
async fn test_own_items_are_skipped() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let config = DrbotConfig::from_toml(POINTLING_CONFIG).unwrap();
    let mut bot = start(&forum, &store, &config, drbot::default_botlings()).await;

    let t0 = Instant::now();
    bot.run_cycle(t0).await;
    forum.push_item(EventKind::CommentRemoved, removal("t1_mine", "drbot", 1));
    let report = bot.run_cycle(later(t0, 1)).await;
    assert_eq!(report.dispatched, 0);
}

#[tokio::test]
async fn test_failing_stream_pauses_alone_and_recovers() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let config = DrbotConfig::from_toml(POINTLING_CONFIG).unwrap();
    let mut bot = start(&forum, &store, &config, drbot::default_botlings()).await;

    forum.fail_next_fetches(
        EventKind::ModAction,
        2,
        ForumErrorKind::Transient("listing unavailable".to_string()),
    );
    let t0 = Instant::now();
    let first = bot.run_cycle(t0).await;
    assert_eq!(first.paused, vec![EventKind::ModAction]);
    assert_eq!(first.polled.len(), 2);

    forum.push_item(EventKind::CommentRemoved, removal("t1_1", "U", 1));
    let second = bot.run_cycle(later(t0, 1)).await;
    assert!(second.paused.is_empty());
    assert!(second.polled.contains(&EventKind::ModAction));
    assert_eq!(second.dispatched, 1);
}

#[tokio::test]
async fn test_merge_by_timestamp_orders_across_streams() {
    for (merge, expected) in [(false, ["t3_b", "t1_a"]), (true, ["t1_a", "t3_b"])] {
        let forum = MemoryForum::new("DrBot");
        let store = MemoryCheckpointStore::new();
        let config = DrbotConfig::from_toml(&format!(
            "[scheduler]\nmerge_by_timestamp = {}\n",
            merge
        ))
        .unwrap();
        let seen: Seen = Arc::default();
        let recorder: Box<dyn Botling> = Box::new(Recorder {
            seen: Arc::clone(&seen),
        });
        let mut bot = start(&forum, &store, &config, vec![recorder]).await;

        let t0 = Instant::now();
        bot.run_cycle(t0).await;
        forum.push_item(EventKind::SubmissionRemoved, removal("t3_b", "U", 5));
        forum.push_item(EventKind::CommentRemoved, removal("t1_a", "V", 4));
        bot.run_cycle(later(t0, 1)).await;

        assert_eq!(*seen.lock().unwrap(), expected.map(str::to_string).to_vec());
    }
}

#[tokio::test]
async fn test_failed_botling_does_not_stop_startup() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let config = DrbotConfig::default();
    let mut botlings = drbot::default_botlings();
    botlings.push(Box::new(NeverStarts));

    let bot = start(&forum, &store, &config, botlings).await;
    assert_eq!(
        bot.dispatcher().names(),
        vec!["Pointling".to_string(), "AdminWatcher".to_string()]
    );
    assert!(!bot.stream_kinds().contains(&EventKind::FlairChange));
}

#[tokio::test]
async fn test_dry_run_touches_nothing_remote() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let config = DrbotConfig::from_toml(POINTLING_CONFIG)
        .unwrap()
        .with_dry_run(true);
    let mut bot = start(&forum, &store, &config, drbot::default_botlings()).await;

    let t0 = Instant::now();
    bot.run_cycle(t0).await;
    for (i, minute) in [1, 2, 3].into_iter().enumerate() {
        forum.push_item(EventKind::CommentRemoved, removal(&format!("t1_{}", i), "U", minute));
    }
    let report = bot.run_cycle(later(t0, 1)).await;
    assert_eq!(report.dispatched, 3);
    assert!(forum.messages().is_empty());
    assert!(forum.bans().is_empty());
    assert!(forum.document("drbot/Pointling").is_none());
}

#[tokio::test]
async fn test_shutdown_flushes_pending_state() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let config = DrbotConfig::from_toml("[scheduler]\ntick_secs = 1\n").unwrap();
    let mut bot = start(&forum, &store, &config, drbot::default_botlings()).await;

    let extra = bot.storage().open("Extra").await.unwrap();
    extra.set("greeting", &"hello").await.unwrap();

    let shutdown = ShutdownHandle::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.shutdown();
    });
    tokio::time::timeout(Duration::from_secs(5), bot.run(shutdown))
        .await
        .unwrap()
        .unwrap();

    assert!(forum.document("drbot/Extra").is_some());
}

fn ban_entry(id: &str, moderator: &str, target: &str, minute: i64) -> RawItem {
    let mut attributes = serde_json::Map::new();
    attributes.insert("action".to_string(), json!("banuser"));
    attributes.insert("target_author".to_string(), json!(target));
    RawItemBuilder::default()
        .id(id)
        .author(moderator)
        .created_utc(at(minute))
        .attributes(attributes)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_own_ban_starts_a_new_interval() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let config = DrbotConfig::from_toml(POINTLING_CONFIG).unwrap();
    let mut bot = start(&forum, &store, &config, drbot::default_botlings()).await;

    let t0 = Instant::now();
    bot.run_cycle(t0).await;
    for minute in 1..=3 {
        forum.push_item(EventKind::CommentRemoved, removal(&format!("t1_{}", minute), "U", minute));
    }
    bot.run_cycle(later(t0, 1)).await;
    assert_eq!(forum.bans().len(), 1);

    // The host's own ban shows up in the mod log
    forum.push_item(EventKind::ModAction, ban_entry("ml_ban", "DrBot", "U", 4));
    let report = bot.run_cycle(later(t0, 2)).await;
    assert_eq!(report.dispatched, 1);

    for minute in 5..=7 {
        forum.push_item(EventKind::CommentRemoved, removal(&format!("t1_{}", minute), "U", minute));
    }
    bot.run_cycle(later(t0, 3)).await;
    assert_eq!(forum.bans().len(), 2);
    assert_eq!(forum.messages().len(), 2);
}

struct StopsAfterFirst {
    seen: Seen,
    shutdown: ShutdownHandle,
}

#[async_trait]
impl Botling for StopsAfterFirst {
    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::CommentRemoved]
    }

    async fn setup(&mut self, _ctx: BotlingContext) -> BotlingResult<()> {
        Ok(())
    }

    async fn handle(&mut self, event: &Event) -> BotlingResult<()> {
        self.seen.lock().unwrap().push(event.subject_id().to_string());
        self.shutdown.shutdown();
        Ok(())
    }
}

#[tokio::test]
async fn test_shutdown_mid_batch_leaves_the_rest_for_next_run() {
    let forum = MemoryForum::new("DrBot");
    let store = MemoryCheckpointStore::new();
    let config = DrbotConfig::default();
    let seen: Seen = Arc::default();
    let shutdown = ShutdownHandle::new();
    let stopper: Box<dyn Botling> = Box::new(StopsAfterFirst {
        seen: Arc::clone(&seen),
        shutdown: shutdown.clone(),
    });
    let mut bot = start(&forum, &store, &config, vec![stopper]).await;
    bot.watch_shutdown(shutdown);

    let t0 = Instant::now();
    bot.run_cycle(t0).await;
    for minute in 0..3 {
        forum.push_item(EventKind::CommentRemoved, removal(&format!("t1_{}", minute), "U", minute + 1));
    }
    let report = bot.run_cycle(later(t0, 1)).await;
    assert!(report.interrupted);
    assert_eq!(report.dispatched, 1);
    assert_eq!(*seen.lock().unwrap(), vec!["t1_0".to_string()]);

    let checkpoint = store.load(EventKind::CommentRemoved).await.unwrap().unwrap();
    assert_eq!(checkpoint.last_id.as_ref().map(|id| id.to_string()), Some("t1_0".to_string()));
    bot.stop().await.unwrap();
    drop(bot);

    let resumed: Seen = Arc::default();
    let recorder: Box<dyn Botling> = Box::new(Recorder {
        seen: Arc::clone(&resumed),
    });
    let mut restarted = start(&forum, &store, &config, vec![recorder]).await;
    let report = restarted.run_cycle(Instant::now()).await;
    assert_eq!(report.dispatched, 2);
    assert_eq!(
        *resumed.lock().unwrap(),
        vec!["t1_1".to_string(), "t1_2".to_string()]
    );
}
