//! Per-stream polling configuration.

use derive_getters::Getters;
use drbot_core::{EventKind, RawItem};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling configuration for one event stream.
///
/// # Examples
///
/// ```
/// use drbot_stream::StreamConfig;
///
/// let config = StreamConfig::default().with_page_size(25);
/// assert_eq!(*config.page_size(), 25);
/// assert_eq!(*config.max_fetch_attempts(), 4);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
pub struct StreamConfig {
    /// Seconds between polls
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,

    /// Items requested per page
    #[serde(default = "default_page_size")]
    page_size: usize,

    /// Pages read per poll before giving up on reaching the checkpoint
    #[serde(default = "default_max_pages")]
    max_pages: usize,

    /// Recently seen ids remembered for deduplication
    #[serde(default = "default_dedup_window")]
    dedup_window: usize,

    /// Fetch attempts per page before the stream pauses
    #[serde(default = "default_max_fetch_attempts")]
    max_fetch_attempts: usize,

    /// Backoff unit (milliseconds); retry n waits about `backoff_base_ms * 2^n`
    #[serde(default = "default_backoff_base_ms")]
    backoff_base_ms: u64,

    /// Longest retry delay (seconds)
    #[serde(default = "default_backoff_max_secs")]
    backoff_max_secs: u64,

    /// Skip items authored by the host's own account
    #[serde(default = "default_skip_own")]
    skip_own: bool,

    /// Own mod-log actions delivered despite `skip_own`
    #[serde(default = "default_keep_own_actions")]
    keep_own_actions: Vec<String>,
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_page_size() -> usize {
    100
}

fn default_max_pages() -> usize {
    10
}

fn default_dedup_window() -> usize {
    500
}

fn default_max_fetch_attempts() -> usize {
    4
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_secs() -> u64 {
    30
}

fn default_skip_own() -> bool {
    true
}

fn default_keep_own_actions() -> Vec<String> {
    vec!["banuser".to_string()]
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            dedup_window: default_dedup_window(),
            max_fetch_attempts: default_max_fetch_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_secs: default_backoff_max_secs(),
            skip_own: default_skip_own(),
            keep_own_actions: default_keep_own_actions(),
        }
    }
}

impl StreamConfig {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Whether an item by the host's own account is dropped.
    ///
    /// Bans the host issues still reach the mod log, so the Botlings that
    /// count "since last ban" see them.
    pub fn skips_own(&self, kind: EventKind, item: &RawItem) -> bool {
        if !self.skip_own {
            return false;
        }
        if kind != EventKind::ModAction {
            return true;
        }
        !item
            .attr_str("action")
            .is_some_and(|action| self.keep_own_actions.iter().any(|kept| kept == action))
    }
}
