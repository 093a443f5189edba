//! Handles a Botling receives at setup.

use crate::BotlingSettings;
use derive_getters::Getters;
use drbot_escalation::ForumActions;
use drbot_interface::ForumClient;
use drbot_storage::Namespace;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A periodic job requested by a Botling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Job name passed back to [`Botling::run_job`](crate::Botling::run_job)
    pub name: String,
    /// Interval between runs
    pub every: Duration,
}

/// Everything a Botling may touch: its settings, its own storage namespace
/// and the forum collaborator.
///
/// Collaborators are injected here rather than reached through globals.
#[derive(Clone, Getters)]
pub struct BotlingContext {
    /// Registered name
    name: String,
    /// Merged, validated settings
    settings: BotlingSettings,
    /// The Botling's exclusive storage partition
    storage: Namespace,
    /// Forum collaborator
    forum: Arc<dyn ForumClient>,
    /// Side effects are logged instead of performed
    dry_run: bool,
    #[getter(skip)]
    jobs: Arc<Mutex<Vec<JobSpec>>>,
}

impl BotlingContext {
    /// Create a context.
    pub fn new(
        name: impl Into<String>,
        settings: BotlingSettings,
        storage: Namespace,
        forum: Arc<dyn ForumClient>,
        dry_run: bool,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            storage,
            forum,
            dry_run,
            jobs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Ask the scheduler to call `run_job(name)` every `every`.
    pub fn schedule_job(&self, name: impl Into<String>, every: Duration) {
        let job = JobSpec {
            name: name.into(),
            every,
        };
        tracing::debug!(botling = %self.name, job = %job.name, every = ?job.every, "Periodic job scheduled");
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(job);
    }

    /// Jobs requested so far.
    pub fn scheduled_jobs(&self) -> Vec<JobSpec> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Escalation actions bound to this context's forum and dry-run mode.
    pub fn actions(&self) -> ForumActions {
        ForumActions::new(Arc::clone(&self.forum), self.dry_run)
    }
}
