//! The main loop: polling cadence, dispatch, flushing, jobs and shutdown.

use crate::{DrbotConfig, SchedulerConfig, ShutdownHandle};
use drbot_botling::{Botling, Dispatcher};
use drbot_core::{Event, EventKind};
use drbot_error::DrbotResult;
use drbot_interface::ForumClient;
use drbot_storage::{CheckpointStore, FlushSummary, StorageAdapter};
use drbot_stream::{Batch, EventPoller};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

struct StreamSlot {
    poller: EventPoller,
    next_poll: Instant,
}

/// What one cycle of the loop did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Streams polled successfully
    pub polled: Vec<EventKind>,
    /// Streams whose fetch failed; retried next cycle
    pub paused: Vec<EventKind>,
    /// Events handed to the dispatcher
    pub dispatched: usize,
    /// Botling hook failures across all events
    pub failed_deliveries: usize,
    /// Whether storage was flushed
    pub flushed: bool,
    /// Periodic jobs run
    pub jobs_run: usize,
    /// Shutdown arrived mid-batch; undelivered events stay uncommitted
    pub interrupted: bool,
}

/// The moderation host.
///
/// Startup registers Botlings, then creates one poller per event kind any
/// Botling subscribes to and restores its checkpoint. Each cycle polls the
/// due streams, dispatches their events, flushes storage and only then
/// commits the checkpoints, so a crash replays events rather than losing
/// state written for them.
pub struct DrBot {
    storage: Arc<StorageAdapter>,
    dispatcher: Dispatcher,
    streams: Vec<StreamSlot>,
    scheduler: SchedulerConfig,
    flush_interval: Duration,
    next_flush: Instant,
    shutdown: ShutdownHandle,
}

impl std::fmt::Debug for DrBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrBot")
            .field("dispatcher", &self.dispatcher)
            .field("streams", &self.stream_kinds())
            .finish_non_exhaustive()
    }
}

impl DrBot {
    /// Run the startup sequence.
    ///
    /// A Botling that fails registration is left out and the host continues.
    /// Failing to reach storage or to load a checkpoint is fatal.
    #[instrument(skip_all, fields(subreddit = %config.subreddit(), dry_run = *config.dry_run()))]
    pub async fn start(
        forum: Arc<dyn ForumClient>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: &DrbotConfig,
        botlings: Vec<Box<dyn Botling>>,
    ) -> DrbotResult<Self> {
        let storage_config = config
            .storage()
            .clone()
            .with_dry_run(*config.dry_run() || *config.storage().dry_run());
        let flush_interval = Duration::from_secs(*storage_config.flush_interval_secs());
        let storage = Arc::new(StorageAdapter::new(Arc::clone(&forum), storage_config));
        storage.load_meta().await?;

        let mut dispatcher = Dispatcher::new(
            Arc::clone(&storage),
            Arc::clone(&forum),
            Arc::new(config.host_settings()),
            *config.dry_run(),
        );
        for botling in botlings {
            let name = botling.name();
            if let Err(e) = dispatcher.register(botling).await {
                warn!(botling = %name, error = %e, "Continuing without Botling");
            }
        }
        if dispatcher.is_empty() {
            warn!("No Botlings registered; nothing will be polled");
        }

        let now = Instant::now();
        let mut streams = Vec::new();
        for kind in dispatcher.subscriptions() {
            let mut poller = EventPoller::new(
                kind,
                Arc::clone(&forum),
                Arc::clone(&checkpoints),
                config.stream(kind),
            );
            poller.load_checkpoint().await?;
            streams.push(StreamSlot {
                poller,
                next_poll: now,
            });
        }

        info!(
            botlings = ?dispatcher.names(),
            streams = streams.len(),
            "DrBot started"
        );
        Ok(Self {
            storage,
            dispatcher,
            streams,
            scheduler: config.scheduler().clone(),
            flush_interval,
            next_flush: now + flush_interval,
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Stop dispatching once `shutdown` fires, even mid-batch.
    pub fn watch_shutdown(&mut self, shutdown: ShutdownHandle) {
        self.shutdown = shutdown;
    }

    /// Registered Botlings and their counters.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The storage adapter.
    pub fn storage(&self) -> &Arc<StorageAdapter> {
        &self.storage
    }

    /// Kinds being polled, in polling order.
    pub fn stream_kinds(&self) -> Vec<EventKind> {
        self.streams.iter().map(|s| s.poller.kind()).collect()
    }

    /// One pass of the loop at time `now`.
    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self, now: Instant) -> CycleReport {
        let mut report = CycleReport::default();

        let mut batches: Vec<(usize, Batch)> = Vec::new();
        for (index, slot) in self.streams.iter_mut().enumerate() {
            if slot.next_poll > now {
                continue;
            }
            let kind = slot.poller.kind();
            slot.next_poll = now + slot.poller.config().poll_interval();
            match slot.poller.poll_once().await {
                Ok(batch) => {
                    report.polled.push(kind);
                    if !batch.is_empty() {
                        batches.push((index, batch));
                    }
                }
                Err(e) if e.is_recoverable() => {
                    warn!(stream = %kind, error = %e, "Stream paused until next cycle");
                    report.paused.push(kind);
                }
                Err(e) => {
                    error!(stream = %kind, error = %e, "Stream fetch failed; retrying next cycle");
                    report.paused.push(kind);
                }
            }
        }

        let events = self.ordered_events(&batches);
        let mut delivered = HashSet::new();
        if !events.is_empty() {
            let kinds: Vec<EventKind> = batches
                .iter()
                .filter(|(_, b)| !b.events().is_empty())
                .map(|(_, b)| b.kind())
                .collect();
            self.dispatcher.start_batch(&kinds).await;
            for event in &events {
                if self.shutdown.is_shutdown() {
                    info!(
                        remaining = events.len() - delivered.len(),
                        "Shutdown requested; leaving the rest of the batch for next run"
                    );
                    report.interrupted = true;
                    break;
                }
                let delivery = self.dispatcher.dispatch(event).await;
                report.failed_deliveries += delivery.failed.len();
                delivered.insert((*event.kind(), event.subject_id().clone()));
            }
            report.dispatched = delivered.len();
        }

        if report.dispatched > 0 || now >= self.next_flush {
            self.flush().await;
            self.next_flush = now + self.flush_interval;
            report.flushed = true;
        }

        for (index, batch) in &batches {
            let delivered_prefix;
            let handed_off = if report.interrupted {
                let count = batch
                    .events()
                    .iter()
                    .take_while(|e| delivered.contains(&(*e.kind(), e.subject_id().clone())))
                    .count();
                delivered_prefix = batch.truncated(count);
                &delivered_prefix
            } else {
                batch
            };
            let slot = &mut self.streams[*index];
            if let Err(e) = slot.poller.commit(handed_off).await {
                warn!(stream = %batch.kind(), error = %e, "Checkpoint not saved; batch will be redelivered");
            }
        }

        if report.interrupted {
            return report;
        }

        let jobs = self.dispatcher.run_due_jobs(now).await;
        report.jobs_run = jobs.delivered.len() + jobs.failed.len();
        if report.jobs_run > 0 {
            self.flush().await;
            report.flushed = true;
        }

        debug!(
            dispatched = report.dispatched,
            paused = report.paused.len(),
            "Cycle complete"
        );
        report
    }

    /// Events of this cycle in dispatch order.
    fn ordered_events(&self, batches: &[(usize, Batch)]) -> Vec<Event> {
        let mut events: Vec<Event> = batches
            .iter()
            .flat_map(|(_, batch)| batch.events().iter().cloned())
            .collect();
        if *self.scheduler.merge_by_timestamp() {
            // Stable, so per-stream order survives equal timestamps
            events.sort_by_key(|event| *event.timestamp());
        }
        events
    }

    async fn flush(&self) -> FlushSummary {
        let summary = self.storage.flush_all().await;
        for (namespace, e) in &summary.failed {
            error!(namespace = %namespace, error = %e, "Storage flush failed; state kept in memory");
        }
        summary
    }

    /// Loop until `shutdown` fires, then flush everything.
    ///
    /// The event in flight finishes; the rest of its batch is left
    /// uncommitted and is delivered again on the next run.
    #[instrument(skip_all)]
    pub async fn run(&mut self, shutdown: ShutdownHandle) -> DrbotResult<()> {
        self.watch_shutdown(shutdown.clone());
        let tick = self.scheduler.tick();
        info!(tick = ?tick, "Entering main loop");
        while !shutdown.is_shutdown() {
            self.run_cycle(Instant::now()).await;
            tokio::select! {
                _ = shutdown.wait() => {}
                _ = tokio::time::sleep(tick) => {}
            }
        }
        self.stop().await
    }

    /// Final flush.
    #[instrument(skip_all)]
    pub async fn stop(&mut self) -> DrbotResult<()> {
        info!("Shutting down; flushing storage");
        let summary = self.flush().await;
        if let Some((_, e)) = summary.failed.into_iter().next() {
            return Err(e.into());
        }
        info!("Shutdown complete");
        Ok(())
    }
}
