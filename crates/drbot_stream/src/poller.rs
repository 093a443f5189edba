//! Event stream poller.

use crate::{DedupWindow, StreamConfig, normalize};
use chrono::{DateTime, Utc};
use drbot_core::{Checkpoint, Event, EventKind, Page, PageRequest, RawItem, SubjectId};
use drbot_error::{
    ForumError, ForumErrorKind, RetryableError, StreamError, StreamErrorKind, StreamResult,
};
use drbot_interface::ForumClient;
use drbot_storage::CheckpointStore;
use futures::Stream;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, info, instrument, warn};

/// New items of one stream, ready for dispatch.
#[derive(Debug, Clone)]
pub struct Batch {
    kind: EventKind,
    events: Vec<Event>,
    // Every consumed item, oldest first, including skipped ones
    positions: Vec<(SubjectId, DateTime<Utc>)>,
}

impl Batch {
    fn empty(kind: EventKind) -> Self {
        Self {
            kind,
            events: Vec::new(),
            positions: Vec::new(),
        }
    }

    /// Stream the batch came from.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Events, oldest first.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Take the events, oldest first.
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Whether the batch moves the checkpoint at all.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Items consumed, skipped ones included.
    pub fn consumed(&self) -> usize {
        self.positions.len()
    }

    /// The part of the batch up to its first `delivered` events.
    ///
    /// Skipped items before the first undelivered event stay in; committing
    /// the result leaves the rest to be polled again.
    pub fn truncated(&self, delivered: usize) -> Batch {
        let Some(first_undelivered) = self.events.get(delivered) else {
            return self.clone();
        };
        let end = self
            .positions
            .iter()
            .position(|(id, _)| id == first_undelivered.subject_id())
            .unwrap_or(self.positions.len());
        Batch {
            kind: self.kind,
            events: self.events[..delivered].to_vec(),
            positions: self.positions[..end].to_vec(),
        }
    }
}

/// Polls one forum listing from a persisted checkpoint.
///
/// Delivery is at-least-once: [`poll_once`](Self::poll_once) never moves the
/// checkpoint, [`commit`](Self::commit) does, after the caller has handed the
/// batch off.
pub struct EventPoller {
    kind: EventKind,
    forum: Arc<dyn ForumClient>,
    store: Arc<dyn CheckpointStore>,
    config: StreamConfig,
    checkpoint: Checkpoint,
    dedup: DedupWindow,
    needs_init: bool,
}

impl std::fmt::Debug for EventPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPoller")
            .field("kind", &self.kind)
            .field("checkpoint", &self.checkpoint)
            .finish_non_exhaustive()
    }
}

impl EventPoller {
    /// Create a poller; call [`load_checkpoint`](Self::load_checkpoint) before polling.
    pub fn new(
        kind: EventKind,
        forum: Arc<dyn ForumClient>,
        store: Arc<dyn CheckpointStore>,
        config: StreamConfig,
    ) -> Self {
        let dedup = DedupWindow::new(*config.dedup_window());
        Self {
            kind,
            forum,
            store,
            config,
            checkpoint: Checkpoint::default(),
            dedup,
            needs_init: true,
        }
    }

    /// Stream this poller reads.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Polling configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Current checkpoint.
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Restore the persisted checkpoint.
    ///
    /// A stream with no checkpoint is initialised on the first poll.
    #[instrument(skip(self), fields(stream = %self.kind))]
    pub async fn load_checkpoint(&mut self) -> StreamResult<()> {
        let loaded = self.store.load(self.kind).await.map_err(|e| {
            StreamError::new(StreamErrorKind::Checkpoint {
                stream: self.kind.to_string(),
                message: e.to_string(),
            })
        })?;
        match loaded {
            Some(checkpoint) => {
                debug!(last_id = ?checkpoint.last_id, "Restored checkpoint");
                self.dedup = DedupWindow::seeded(*self.config.dedup_window(), &checkpoint.recent_ids);
                if let Some(last) = &checkpoint.last_id {
                    self.dedup.insert(last.clone());
                }
                self.checkpoint = checkpoint;
                self.needs_init = false;
            }
            None => {
                info!("No checkpoint; stream starts at its newest item");
                self.needs_init = true;
            }
        }
        Ok(())
    }

    /// Read everything newer than the checkpoint, oldest first.
    ///
    /// On a stream's very first poll the checkpoint is set to the newest
    /// existing item and nothing is returned.
    #[instrument(skip(self), fields(stream = %self.kind))]
    pub async fn poll_once(&mut self) -> StreamResult<Batch> {
        if self.needs_init {
            self.initialize().await?;
            return Ok(Batch::empty(self.kind));
        }

        let page_size = *self.config.page_size();
        let mut request = PageRequest::first(page_size);
        let mut newest_first: Vec<RawItem> = Vec::new();
        let mut reached = self.checkpoint.is_empty();

        'pages: for _ in 0..*self.config.max_pages() {
            let page = self.fetch(&request).await?;
            for item in page.items {
                if self.is_at_or_before_checkpoint(&item) {
                    reached = true;
                    break 'pages;
                }
                newest_first.push(item);
            }
            match page.after {
                Some(cursor) => request = PageRequest::after(cursor, page_size),
                None => {
                    reached = true;
                    break;
                }
            }
        }
        if !reached {
            warn!(
                pages = *self.config.max_pages(),
                "Checkpoint not reached; older items may have been missed"
            );
        }

        let account = self.forum.account_name().to_string();
        let mut batch = Batch::empty(self.kind);
        let mut in_batch = HashSet::new();
        for item in newest_first.into_iter().rev() {
            let id = SubjectId::new(item.id().as_str());
            if self.dedup.contains(&id) || !in_batch.insert(id.clone()) {
                debug!(subject_id = %id, "Duplicate item skipped");
                continue;
            }
            batch.positions.push((id.clone(), *item.created_utc()));

            if item.author().eq_ignore_ascii_case(&account) && self.config.skips_own(self.kind, &item) {
                debug!(subject_id = %id, "Own item skipped");
                continue;
            }
            match normalize(self.kind, &item) {
                Ok(event) => batch.events.push(event),
                Err(reason) => warn!(subject_id = %id, %reason, "Unusable item skipped"),
            }
        }

        debug!(
            events = batch.events.len(),
            consumed = batch.consumed(),
            "Polled stream"
        );
        Ok(batch)
    }

    /// Advance and persist the checkpoint past a handed-off batch.
    #[instrument(skip(self, batch), fields(stream = %self.kind, consumed = batch.consumed()))]
    pub async fn commit(&mut self, batch: &Batch) -> StreamResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let window = *self.config.dedup_window();
        for (id, timestamp) in &batch.positions {
            self.checkpoint.advance(id.clone(), *timestamp, window);
            self.dedup.insert(id.clone());
        }
        self.save().await
    }

    /// Endless stream of events, polling every `poll_interval_secs`.
    ///
    /// A batch is committed when the consumer asks for the item after its
    /// last event, i.e. once the consumer has finished with it. Fetch and
    /// checkpoint failures are yielded as errors and polling continues.
    pub fn events(mut self) -> impl Stream<Item = StreamResult<Event>> + Send {
        async_stream::stream! {
            let mut interval = tokio::time::interval(self.config.poll_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match self.poll_once().await {
                    Ok(batch) => {
                        for event in batch.events() {
                            yield Ok(event.clone());
                        }
                        if let Err(e) = self.commit(&batch).await {
                            yield Err(e);
                        }
                    }
                    Err(e) => yield Err(e),
                }
            }
        }
    }

    fn is_at_or_before_checkpoint(&self, item: &RawItem) -> bool {
        if self.checkpoint.last_id.as_ref().map(|id| id.as_str()) == Some(item.id().as_str()) {
            return true;
        }
        match self.checkpoint.last_timestamp {
            Some(last) => *item.created_utc() < last,
            None => false,
        }
    }

    async fn initialize(&mut self) -> StreamResult<()> {
        let page = self.fetch(&PageRequest::first(1)).await?;
        if let Some(latest) = page.items.first() {
            info!(subject_id = %latest.id(), "Initialised checkpoint to newest item");
            let id = SubjectId::new(latest.id().as_str());
            self.checkpoint
                .advance(id.clone(), *latest.created_utc(), *self.config.dedup_window());
            self.dedup.insert(id);
        } else {
            info!("Stream is empty; every future item is new");
        }
        self.save().await?;
        self.needs_init = false;
        Ok(())
    }

    async fn save(&self) -> StreamResult<()> {
        self.store
            .save(self.kind, &self.checkpoint)
            .await
            .map_err(|e| {
                StreamError::new(StreamErrorKind::Checkpoint {
                    stream: self.kind.to_string(),
                    message: e.to_string(),
                })
            })
    }

    async fn fetch(&self, request: &PageRequest) -> StreamResult<Page> {
        let attempts = std::sync::atomic::AtomicUsize::new(0);
        let retry_strategy = backoff(&self.config)
            .map(jitter)
            .take(self.config.max_fetch_attempts().saturating_sub(1));

        let result: Result<Page, ForumError> = Retry::spawn(retry_strategy, || {
            let attempt = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            let forum = self.forum.clone();
            let kind = self.kind;
            let request = request.clone();
            async move {
                match forum.fetch_recent(kind, &request).await {
                    Ok(page) => Ok(page),
                    Err(e) if e.is_retryable() => {
                        let retry_after = quota_wait(&e);
                        warn!(attempt, error = %e, ?retry_after, "Fetch failed, will retry");
                        Err(RetryError::Transient { err: e, retry_after })
                    }
                    Err(e) => {
                        warn!(error = %e, "Permanent fetch error, failing immediately");
                        Err(RetryError::Permanent(e))
                    }
                }
            }
        })
        .await;

        result.map_err(|e| {
            let stream = self.kind.to_string();
            if e.is_retryable() {
                StreamError::new(StreamErrorKind::TransientFetch {
                    stream,
                    attempts: attempts.load(std::sync::atomic::Ordering::SeqCst),
                    message: e.to_string(),
                })
            } else {
                StreamError::new(StreamErrorKind::Fetch {
                    stream,
                    message: e.to_string(),
                })
            }
        })
    }
}

/// Retry delays before jitter: `backoff_base_ms * 2^n`, capped at `backoff_max_secs`.
fn backoff(config: &StreamConfig) -> ExponentialBackoff {
    ExponentialBackoff::from_millis(2)
        .factor((*config.backoff_base_ms()).max(1))
        .max_delay(Duration::from_secs(*config.backoff_max_secs()))
}

/// Wait the forum asked for on a rate limit; other errors use the backoff.
fn quota_wait(error: &ForumError) -> Option<Duration> {
    match error.kind {
        ForumErrorKind::RateLimited(_) => {
            let (initial_ms, _, max_delay_secs) = error.retry_strategy_params();
            Some(Duration::from_millis(initial_ms.min(max_delay_secs.saturating_mul(1000))))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_base() {
        let config = StreamConfig::default()
            .with_backoff_base_ms(500)
            .with_backoff_max_secs(5);
        let delays: Vec<u128> = backoff(&config).take(5).map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000]);
    }

    #[test]
    fn test_rate_limit_waits_the_quota_window() {
        let limited = ForumError::new(ForumErrorKind::RateLimited(7));
        assert_eq!(quota_wait(&limited), Some(Duration::from_secs(7)));

        let long = ForumError::new(ForumErrorKind::RateLimited(600));
        assert_eq!(quota_wait(&long), Some(Duration::from_secs(120)));

        let transient = ForumError::new(ForumErrorKind::Transient("502".to_string()));
        assert_eq!(quota_wait(&transient), None);
    }
}
