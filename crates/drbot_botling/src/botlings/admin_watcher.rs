//! Alerts moderators to actions taken by the forum's admins.

use crate::{Botling, BotlingContext, SettingsSchema, validators};
use async_trait::async_trait;
use drbot_core::{Event, EventKind};
use drbot_error::{BotlingError, BotlingResult};
use drbot_interface::{ForumClient, MessageTarget};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

/// Account the forum's admins act under.
pub const DEFAULT_ADMIN_ACCOUNT: &str = "Anti-Evil Operations";

struct Watching {
    forum: Arc<dyn ForumClient>,
    admin_account: String,
    dry_run: bool,
}

/// Watches the mod log for admin actions and tells the moderators.
#[derive(Default)]
pub struct AdminWatcher {
    watching: Option<Watching>,
}

impl AdminWatcher {
    /// Create an AdminWatcher; settings arrive at setup.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Botling for AdminWatcher {
    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::ModAction]
    }

    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::default().option(
            "admin_account",
            json!(DEFAULT_ADMIN_ACCOUNT),
            validators::string(),
        )
    }

    async fn setup(&mut self, ctx: BotlingContext) -> BotlingResult<()> {
        self.watching = Some(Watching {
            forum: Arc::clone(ctx.forum()),
            admin_account: ctx.settings().get("admin_account")?,
            dry_run: *ctx.dry_run(),
        });
        Ok(())
    }

    #[instrument(skip_all, fields(subject_id = %event.subject_id()))]
    async fn handle(&mut self, event: &Event) -> BotlingResult<()> {
        let watching = self
            .watching
            .as_ref()
            .ok_or_else(|| BotlingError::handler("AdminWatcher used before setup"))?;
        let Some(details) = event.payload().as_mod_action() else {
            return Ok(());
        };
        if details.moderator != watching.admin_account {
            return Ok(());
        }

        let time = event.timestamp().format("%Y-%m-%d %H:%M UTC");
        let target = details.target_id.as_deref().unwrap_or("an item");
        info!(action = %details.action, target_id = target, %time, "Admins took action");

        let kind = match details.action.as_str() {
            "removecomment" => Some("comment"),
            "removelink" => Some("post"),
            _ => None,
        };
        let (subject, body) = match kind {
            Some(kind) => (
                format!("Admins removed a {} in your sub", kind),
                format!(
                    "On {}, the admins removed a {} ({}) by u/{} in your sub.",
                    time,
                    kind,
                    target,
                    event.author_id()
                ),
            ),
            None => (
                format!("Admins took action \"{}\" in your sub", details.action),
                format!(
                    "On {}, the admins took action {} on {} in your sub. See DrBot's log for details.",
                    time, details.action, target
                ),
            ),
        };

        if watching.dry_run {
            info!(%subject, "[DRY RUN] would have notified moderators");
            return Ok(());
        }
        watching
            .forum
            .post_message(&MessageTarget::Moderators, &subject, &body)
            .await?;
        Ok(())
    }
}
