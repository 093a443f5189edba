//! Settings collaborator.

use serde_json::Value;
use std::collections::HashMap;

/// Supplies host configuration values per Botling.
///
/// Values returned here override a Botling's declared defaults.
pub trait SettingsSource: Send + Sync {
    /// Configured value of one option, if the host sets it.
    fn get(&self, botling: &str, option: &str) -> Option<Value>;

    /// Every option the host sets for a Botling.
    fn options(&self, botling: &str) -> Vec<String>;
}

/// Settings held in memory, keyed by Botling name then option name.
///
/// # Examples
///
/// ```
/// use drbot_interface::{SettingsSource, StaticSettings};
/// use serde_json::json;
///
/// let settings = StaticSettings::default().with("Pointling", "expiration_months", json!(3));
/// assert_eq!(settings.get("Pointling", "expiration_months"), Some(json!(3)));
/// assert_eq!(settings.get("Pointling", "missing"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    values: HashMap<String, serde_json::Map<String, Value>>,
}

impl StaticSettings {
    /// Create from a table per Botling.
    pub fn new(values: HashMap<String, serde_json::Map<String, Value>>) -> Self {
        Self { values }
    }

    /// Set one option.
    pub fn with(mut self, botling: impl Into<String>, option: impl Into<String>, value: Value) -> Self {
        self.values
            .entry(botling.into())
            .or_default()
            .insert(option.into(), value);
        self
    }
}

impl SettingsSource for StaticSettings {
    fn get(&self, botling: &str, option: &str) -> Option<Value> {
        self.values
            .get(botling)
            .and_then(|table| table.get(option))
            .cloned()
    }

    fn options(&self, botling: &str) -> Vec<String> {
        self.values
            .get(botling)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default()
    }
}
