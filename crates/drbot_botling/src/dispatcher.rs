//! Botling registry and event dispatch.

use crate::{Botling, BotlingContext, BotlingSettings, JobSpec};
use derive_getters::Getters;
use drbot_core::{Event, EventKind};
use drbot_error::{
    BotlingError, BotlingErrorKind, BotlingResult, RegistryError, RegistryErrorKind,
    RegistryResult,
};
use drbot_interface::{ForumClient, SettingsSource};
use drbot_storage::{META_NAMESPACE, StorageAdapter};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Per-Botling hook counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
pub struct BotlingStats {
    /// Events handled successfully
    delivered: u64,
    /// Hook invocations that failed or panicked
    failed: u64,
    /// Failures since the last success
    consecutive_failures: u32,
    /// Message of the most recent failure
    last_error: Option<String>,
}

impl BotlingStats {
    fn record(&mut self, outcome: &Result<(), String>, counts_delivery: bool) {
        match outcome {
            Ok(()) => {
                if counts_delivery {
                    self.delivered += 1;
                }
                self.consecutive_failures = 0;
            }
            Err(message) => {
                self.failed += 1;
                self.consecutive_failures += 1;
                self.last_error = Some(message.clone());
            }
        }
    }
}

/// What happened when one event (or batch start, or job tick) was handed out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Botlings whose hook succeeded, in call order
    pub delivered: Vec<String>,
    /// Botlings whose hook failed, with the error
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    /// Whether every invoked Botling succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn push(&mut self, name: &str, outcome: Result<(), String>) {
        match outcome {
            Ok(()) => self.delivered.push(name.to_string()),
            Err(message) => self.failed.push((name.to_string(), message)),
        }
    }
}

// Longest job interval honoured; anything longer never comes due in practice
const MAX_JOB_INTERVAL: Duration = Duration::from_secs(86_400 * 365 * 30);

struct ScheduledJob {
    spec: JobSpec,
    next_due: Instant,
}

impl ScheduledJob {
    fn due_after(now: Instant, every: Duration) -> Instant {
        now + every.min(MAX_JOB_INTERVAL)
    }
}

struct Registered {
    name: String,
    botling: Box<dyn Botling>,
    subscriptions: Vec<EventKind>,
    stats: BotlingStats,
    jobs: Vec<ScheduledJob>,
}

impl Registered {
    fn subscribes_to(&self, kind: EventKind) -> bool {
        self.subscriptions.contains(&kind)
    }
}

/// Owns the registered Botlings and routes events to them.
///
/// Botlings are invoked one at a time, in registration order. Every hook call
/// is isolated: an error or panic is logged with the Botling's name and the
/// event's subject id, counted in [`BotlingStats`], and never reaches the
/// caller or the other Botlings.
pub struct Dispatcher {
    storage: Arc<StorageAdapter>,
    forum: Arc<dyn ForumClient>,
    settings: Arc<dyn SettingsSource>,
    dry_run: bool,
    botlings: Vec<Registered>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("botlings", &self.names())
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create an empty registry.
    pub fn new(
        storage: Arc<StorageAdapter>,
        forum: Arc<dyn ForumClient>,
        settings: Arc<dyn SettingsSource>,
        dry_run: bool,
    ) -> Self {
        Self {
            storage,
            forum,
            settings,
            dry_run,
            botlings: Vec::new(),
        }
    }

    /// Check a Botling's name and settings without registering it.
    pub fn validate(&self, botling: &dyn Botling) -> RegistryResult<BotlingSettings> {
        let name = botling.name();
        if name == META_NAMESPACE {
            return Err(RegistryError::new(RegistryErrorKind::ReservedName(name)));
        }
        if self.botlings.iter().any(|r| r.name == name) {
            return Err(RegistryError::new(RegistryErrorKind::DuplicateName(name)));
        }

        let settings_error = |message: String| {
            RegistryError::new(RegistryErrorKind::Settings {
                botling: name.clone(),
                message,
            })
        };
        let settings = botling
            .settings_schema()
            .merge(&name, self.settings.as_ref())
            .map_err(settings_error)?;
        botling
            .validate_settings(&settings)
            .map_err(settings_error)?;
        Ok(settings)
    }

    /// Register a Botling: validate its settings, bind its storage namespace
    /// and run its setup hook.
    ///
    /// On failure the Botling is dropped, its namespace is closed and the
    /// registry is unchanged.
    #[instrument(skip_all, fields(botling = %botling.name()))]
    pub async fn register(&mut self, mut botling: Box<dyn Botling>) -> RegistryResult<()> {
        let name = botling.name();
        let settings = self.validate(botling.as_ref()).inspect_err(|e| {
            error!(error = %e, "Botling rejected");
        })?;

        let storage = self.storage.open(&name).await.map_err(|e| {
            let err = RegistryError::new(RegistryErrorKind::Storage {
                botling: name.clone(),
                message: e.to_string(),
            });
            error!(error = %err, "Botling rejected");
            err
        })?;

        let ctx = BotlingContext::new(
            name.clone(),
            settings,
            storage,
            Arc::clone(&self.forum),
            self.dry_run,
        );
        if let Err(message) = guarded(botling.setup(ctx.clone())).await {
            let err = RegistryError::new(RegistryErrorKind::Setup {
                botling: name.clone(),
                message,
            });
            error!(error = %err, "Botling rejected");
            self.storage.close(&name).await;
            return Err(err);
        }

        let now = Instant::now();
        let jobs = ctx
            .scheduled_jobs()
            .into_iter()
            .map(|spec| ScheduledJob {
                next_due: ScheduledJob::due_after(now, spec.every),
                spec,
            })
            .collect();
        let subscriptions = botling.subscriptions();
        info!(subscriptions = ?subscriptions, "Botling registered");

        self.botlings.push(Registered {
            name,
            botling,
            subscriptions,
            stats: BotlingStats::default(),
            jobs,
        });
        Ok(())
    }

    /// Deliver an event to every subscribed Botling, in registration order.
    #[instrument(skip_all, fields(kind = %event.kind(), subject_id = %event.subject_id()))]
    pub async fn dispatch(&mut self, event: &Event) -> DispatchReport {
        let mut report = DispatchReport::default();
        for registered in self
            .botlings
            .iter_mut()
            .filter(|r| r.subscribes_to(*event.kind()))
        {
            let outcome = guarded(registered.botling.handle(event)).await;
            if let Err(message) = &outcome {
                warn!(
                    botling = %registered.name,
                    subject_id = %event.subject_id(),
                    error = %message,
                    "Botling failed to handle event"
                );
            }
            registered.stats.record(&outcome, true);
            report.push(&registered.name, outcome);
        }
        debug!(delivered = report.delivered.len(), failed = report.failed.len(), "Event dispatched");
        report
    }

    /// Call `start_batch` on every Botling subscribed to any of `kinds`.
    #[instrument(skip(self))]
    pub async fn start_batch(&mut self, kinds: &[EventKind]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for registered in self
            .botlings
            .iter_mut()
            .filter(|r| kinds.iter().any(|k| r.subscribes_to(*k)))
        {
            let outcome = guarded(registered.botling.start_batch()).await;
            if let Err(message) = &outcome {
                warn!(botling = %registered.name, error = %message, "Botling failed to start batch");
            }
            registered.stats.record(&outcome, false);
            report.push(&registered.name, outcome);
        }
        report
    }

    /// Run every periodic job due at `now`, then schedule its next run.
    #[instrument(skip(self))]
    pub async fn run_due_jobs(&mut self, now: Instant) -> DispatchReport {
        let mut report = DispatchReport::default();
        for registered in self.botlings.iter_mut() {
            for job in registered.jobs.iter_mut().filter(|j| j.next_due <= now) {
                job.next_due = ScheduledJob::due_after(now, job.spec.every);
                let outcome = guarded(registered.botling.run_job(&job.spec.name)).await;
                match &outcome {
                    Ok(()) => debug!(botling = %registered.name, job = %job.spec.name, "Job ran"),
                    Err(message) => {
                        warn!(botling = %registered.name, job = %job.spec.name, error = %message, "Job failed")
                    }
                }
                registered.stats.record(&outcome, false);
                report.push(&registered.name, outcome);
            }
        }
        report
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.botlings.iter().map(|r| r.name.clone()).collect()
    }

    /// Union of every Botling's subscriptions.
    pub fn subscriptions(&self) -> BTreeSet<EventKind> {
        self.botlings
            .iter()
            .flat_map(|r| r.subscriptions.iter().copied())
            .collect()
    }

    /// Counters per Botling, in registration order.
    pub fn stats(&self) -> Vec<(String, BotlingStats)> {
        self.botlings
            .iter()
            .map(|r| (r.name.clone(), r.stats.clone()))
            .collect()
    }

    /// Number of registered Botlings.
    pub fn len(&self) -> usize {
        self.botlings.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.botlings.is_empty()
    }
}

/// Await a hook, turning errors and panics into a message.
async fn guarded(hook: BoxFuture<'_, BotlingResult<()>>) -> Result<(), String> {
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(BotlingError::new(BotlingErrorKind::Panic(panic_message(panic.as_ref()))).to_string()),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
