//! Points-to-ban escalation engine for DrBot.
//!
//! A Botling awards points to users for qualifying events. The engine keeps a
//! per-user [`Ledger`] of awards and evaluates a [`ThresholdPolicy`] after
//! every award: each threshold the running total reaches fires its action
//! exactly once, lowest threshold first.
//!
//! Awards are idempotent per subject id, so replaying an event stream after a
//! crash reproduces the same ledger.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod award;
mod engine;
mod ledger;
mod point_map;
mod policy;
mod report;

pub use action::{ActionSink, ForumActions};
pub use award::Award;
pub use engine::{AwardOutcome, EscalationEngine};
pub use ledger::{HistoryRecord, Ledger, LedgerEntry};
pub use point_map::{PointMap, PointMapEntry};
pub use policy::{Threshold, ThresholdAction, ThresholdPolicy};
pub use report::NotifyReport;
