//! The Botling trait.

use crate::{BotlingContext, BotlingSettings, SettingsSchema};
use async_trait::async_trait;
use drbot_core::{Event, EventKind};
use drbot_error::BotlingResult;

/// An independently registered moderation behavior.
///
/// The host constructs a Botling, registers it once with the
/// [`Dispatcher`](crate::Dispatcher), and from then on the Botling only sees
/// events of the kinds it subscribes to. Hooks run one at a time; a Botling
/// never sees concurrent calls.
#[async_trait]
pub trait Botling: Send {
    /// Unique registry name; defaults to the type name without its path.
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Event kinds this Botling wants.
    fn subscriptions(&self) -> Vec<EventKind>;

    /// Options this Botling recognizes.
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::default()
    }

    /// Cross-option checks run after the per-option validators.
    fn validate_settings(&self, _settings: &BotlingSettings) -> Result<(), String> {
        Ok(())
    }

    /// Called once after registration succeeds.
    async fn setup(&mut self, ctx: BotlingContext) -> BotlingResult<()>;

    /// Called once per polled batch, before any of its events.
    async fn start_batch(&mut self) -> BotlingResult<()> {
        Ok(())
    }

    /// Handle one event of a subscribed kind.
    async fn handle(&mut self, event: &Event) -> BotlingResult<()>;

    /// Run a periodic job scheduled through the context.
    async fn run_job(&mut self, _job: &str) -> BotlingResult<()> {
        Ok(())
    }
}

/// `drbot_botling::botlings::Pointling` -> `Pointling`
pub(crate) fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

#[cfg(test)]
mod tests {
    use super::short_type_name;

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("drbot_botling::botlings::Pointling"), "Pointling");
        assert_eq!(short_type_name("my::Wrapper<my::Inner>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
