//! Points-based escalation over removals.

use crate::{Botling, BotlingContext, SettingsSchema, validators};
use async_trait::async_trait;
use chrono::Utc;
use drbot_core::{Event, EventKind, Payload, SubjectId, UserId};
use drbot_error::{BotlingError, BotlingResult};
use drbot_escalation::{
    Award, AwardOutcome, EscalationEngine, ForumActions, Ledger, PointMap, PointMapEntry,
    ThresholdPolicy,
};
use drbot_storage::Namespace;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Storage key of the persisted ledger.
pub const LEDGER_KEY: &str = "ledger";

/// Name of the periodic expiry job.
pub const EXPIRE_JOB: &str = "expire";

const BAN_ACTION: &str = "banuser";
const APPROVE_ACTIONS: [&str; 2] = ["approvelink", "approvecomment"];
const AUTOMOD: &str = "AutoModerator";

struct Running {
    engine: EscalationEngine,
    point_map: PointMap,
    actions: ForumActions,
    storage: Namespace,
    missing_reason_points: u32,
    allow_custom: bool,
    excluded_users: Vec<String>,
    exclude_automod: bool,
}

impl Running {
    fn is_excluded(&self, user: &UserId) -> bool {
        user.is_deleted() || self.excluded_users.iter().any(|u| user.matches(u))
    }

    async fn persist(&self) -> BotlingResult<()> {
        self.storage.set(LEDGER_KEY, self.engine.ledger()).await?;
        Ok(())
    }
}

/// Awards points for removals and escalates through a threshold policy.
///
/// Each removal costs the points its removal reason maps to; a removal with
/// no reason costs `missing_reason_points`. A moderator note containing `[N]`
/// overrides the cost with N. Removals made by AutoModerator alone are not
/// counted unless `exclude_automod` is off. Reapproving a removed item
/// cancels its points, and an observed `banuser` mod action starts a new
/// violation interval for the banned user.
#[derive(Default)]
pub struct Pointling {
    running: Option<Running>,
}

impl Pointling {
    /// Create an unconfigured Pointling; settings arrive at setup.
    pub fn new() -> Self {
        Self::default()
    }

    fn running(&mut self) -> BotlingResult<&mut Running> {
        self.running
            .as_mut()
            .ok_or_else(|| BotlingError::handler("Pointling used before setup"))
    }

    async fn handle_removal(&mut self, event: &Event) -> BotlingResult<()> {
        let running = self.running()?;
        let user = event.author_id();
        if running.is_excluded(user) {
            debug!(user = %user, "Skipping excluded user");
            return Ok(());
        }

        let details = event.payload().as_removal().cloned().unwrap_or_default();
        let by_automod = details
            .moderator
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case(AUTOMOD));
        if running.exclude_automod && by_automod {
            debug!(user = %user, subject_id = %event.subject_id(), "AutoModerator removal not counted");
            return Ok(());
        }
        let reason = details.removal_reason.as_deref();
        let custom = details
            .mod_note
            .as_deref()
            .filter(|_| running.allow_custom)
            .and_then(|note| running.point_map.custom_points(note));
        let points = match (custom, reason) {
            (Some(points), _) => points,
            (None, Some(reason)) => running.point_map.points(reason),
            (None, None) => running.missing_reason_points,
        };
        if points == 0 {
            debug!(user = %user, subject_id = %event.subject_id(), "Removal costs no points");
            return Ok(());
        }

        let award = Award::new(user.clone(), event.subject_id().clone(), i64::from(points))
            .with_reason(details.removal_reason.clone())
            .with_timestamp(*event.timestamp())
            .with_expires_at(running.point_map.expires_at(reason, *event.timestamp()));
        let outcome = running.engine.award(award, &running.actions).await?;
        if let AwardOutcome::Recorded { total, fired } = &outcome {
            info!(user = %user, points, total, ?fired, "Points awarded");
            running.persist().await?;
        }
        Ok(())
    }

    async fn handle_mod_action(&mut self, event: &Event) -> BotlingResult<()> {
        let running = self.running()?;
        let Some(details) = event.payload().as_mod_action() else {
            return Ok(());
        };
        let user = event.author_id();
        if APPROVE_ACTIONS.contains(&details.action.as_str()) {
            let Some(target) = details.target_id.as_deref() else {
                return Ok(());
            };
            if running
                .engine
                .revoke(user, &SubjectId::new(target), *event.timestamp())
            {
                running.persist().await?;
            }
            return Ok(());
        }
        if details.action != BAN_ACTION {
            return Ok(());
        }
        let reason = format!("banned by {}", details.moderator);
        if running
            .engine
            .reset(user, event.subject_id(), *event.timestamp(), Some(reason))
        {
            running.persist().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Botling for Pointling {
    fn subscriptions(&self) -> Vec<EventKind> {
        vec![
            EventKind::SubmissionRemoved,
            EventKind::CommentRemoved,
            EventKind::ModAction,
        ]
    }

    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::default()
            .option(
                "thresholds",
                json!([{ "points": 12, "action": "notify_mods" }]),
                validators::deserializes::<ThresholdPolicy>(),
            )
            .option(
                "point_map",
                json!([]),
                validators::deserializes::<Vec<PointMapEntry>>(),
            )
            .option("expiration_months", json!(6), validators::non_negative_integer())
            .option("missing_reason_points", json!(1), validators::non_negative_integer())
            .option("allow_custom", json!(true), validators::boolean())
            .option(
                "excluded_users",
                json!([]),
                validators::array_of(validators::string()),
            )
            .option("exclude_automod", json!(true), validators::boolean())
            .option("expire_interval_minutes", json!(60), validators::positive_integer())
    }

    #[instrument(skip_all, fields(botling = %ctx.name()))]
    async fn setup(&mut self, ctx: BotlingContext) -> BotlingResult<()> {
        let settings = ctx.settings();
        let policy: ThresholdPolicy = settings.get("thresholds")?;
        let point_map = PointMap::new(
            settings.get("point_map")?,
            settings.get("expiration_months")?,
        )?;
        let ledger: Ledger = ctx.storage().get(LEDGER_KEY).await?.unwrap_or_default();
        info!(users = ledger.len(), thresholds = policy.thresholds().len(), "Ledger loaded");

        let minutes: u64 = settings.get("expire_interval_minutes")?;
        ctx.schedule_job(EXPIRE_JOB, Duration::from_secs(minutes.saturating_mul(60)));

        self.running = Some(Running {
            engine: EscalationEngine::with_ledger(policy, ledger),
            point_map,
            actions: ctx.actions(),
            storage: ctx.storage().clone(),
            missing_reason_points: settings.get("missing_reason_points")?,
            allow_custom: settings.get("allow_custom")?,
            excluded_users: settings.get("excluded_users")?,
            exclude_automod: settings.get("exclude_automod")?,
        });
        Ok(())
    }

    async fn handle(&mut self, event: &Event) -> BotlingResult<()> {
        match event.payload() {
            Payload::Removal(_) => self.handle_removal(event).await,
            Payload::ModAction(_) => self.handle_mod_action(event).await,
            _ => Ok(()),
        }
    }

    async fn run_job(&mut self, job: &str) -> BotlingResult<()> {
        if job != EXPIRE_JOB {
            return Ok(());
        }
        let running = self.running()?;
        let expired = running.engine.expire(Utc::now());
        if expired > 0 {
            info!(expired, "Awards expired");
            running.persist().await?;
        }
        Ok(())
    }
}
