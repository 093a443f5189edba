//! DrBot: moderation automation for a forum community.
//!
//! The host polls moderation event streams, hands each event to the
//! [`Botling`](drbot_botling::Botling)s subscribed to it, and persists every
//! Botling's state in its own storage namespace. This crate wires the pieces
//! together:
//!
//! - [`DrbotConfig`] loads layered TOML configuration
//! - [`DrBot`] runs the startup sequence and the main loop
//! - [`ShutdownHandle`] stops the loop after the event in flight
//! - [`init_logging`] installs the tracing subscriber

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod observability;
mod scheduler;
mod shutdown;

pub use config::{DrbotConfig, HostSettings, LoggingConfig, SchedulerConfig};
pub use observability::init_logging;
pub use scheduler::{CycleReport, DrBot};
pub use shutdown::ShutdownHandle;

use drbot_botling::Botling;
use drbot_botling::botlings::{AdminWatcher, Pointling};

/// The Botlings DrBot ships with, in registration order.
pub fn default_botlings() -> Vec<Box<dyn Botling>> {
    vec![Box::new(Pointling::new()), Box::new(AdminWatcher::new())]
}
