//! Side effects of fired thresholds.

use crate::NotifyReport;
use async_trait::async_trait;
use drbot_core::UserId;
use drbot_error::ForumResult;
use drbot_interface::{ForumClient, MessageTarget};
use std::sync::Arc;

/// Performs the actions thresholds fire.
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Tell the moderators about a user.
    async fn notify_mods(&self, report: &NotifyReport) -> ForumResult<()>;

    /// Ban a user; `None` duration is permanent.
    async fn ban_user(
        &self,
        user: &UserId,
        reason: &str,
        duration_days: Option<u32>,
    ) -> ForumResult<()>;
}

/// Actions carried out through a [`ForumClient`].
///
/// In dry-run mode every action is logged and reported as done.
#[derive(Clone)]
pub struct ForumActions {
    forum: Arc<dyn ForumClient>,
    dry_run: bool,
}

impl ForumActions {
    /// Create actions backed by `forum`.
    pub fn new(forum: Arc<dyn ForumClient>, dry_run: bool) -> Self {
        Self { forum, dry_run }
    }
}

#[async_trait]
impl ActionSink for ForumActions {
    #[tracing::instrument(skip(self, report), fields(user = %report.user, total = report.total))]
    async fn notify_mods(&self, report: &NotifyReport) -> ForumResult<()> {
        if self.dry_run {
            tracing::info!("[DRY RUN] would have notified moderators");
            return Ok(());
        }
        self.forum
            .post_message(&MessageTarget::Moderators, &report.subject(), &report.body())
            .await
    }

    #[tracing::instrument(skip(self, reason), fields(user = %user))]
    async fn ban_user(
        &self,
        user: &UserId,
        reason: &str,
        duration_days: Option<u32>,
    ) -> ForumResult<()> {
        if self.dry_run {
            tracing::info!(?duration_days, "[DRY RUN] would have banned user");
            return Ok(());
        }
        self.forum.ban(user, reason, duration_days).await
    }
}
