//! Botling hosting for DrBot.
//!
//! A [`Botling`] is an independently registered moderation behavior with its
//! own settings and its own storage namespace. The [`Dispatcher`] validates
//! and registers Botlings, then routes each event to every Botling subscribed
//! to its kind, isolating failures so one misbehaving Botling never affects
//! its siblings or the host.
//!
//! Two Botlings ship with the crate: [`botlings::Pointling`] (points-to-ban
//! escalation) and [`botlings::AdminWatcher`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod botling;
pub mod botlings;
mod context;
mod dispatcher;
mod schema;

pub use botling::Botling;
pub use context::{BotlingContext, JobSpec};
pub use dispatcher::{BotlingStats, DispatchReport, Dispatcher};
pub use schema::{BotlingSettings, SettingSpec, SettingsSchema, Validator, validators};
