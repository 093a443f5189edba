//! Botlings shipped with DrBot.

mod admin_watcher;
mod pointling;

pub use admin_watcher::{AdminWatcher, DEFAULT_ADMIN_ACCOUNT};
pub use pointling::{EXPIRE_JOB, LEDGER_KEY, Pointling};
