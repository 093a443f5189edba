//! Typed settings schema and merged settings view.

use drbot_error::{BotlingError, BotlingErrorKind, BotlingResult};
use drbot_interface::SettingsSource;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Checks one option value, returning a message on failure.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// One declared option.
#[derive(Clone)]
pub struct SettingSpec {
    /// Value used when the host sets nothing
    pub default: Value,
    /// Check applied to the merged value
    pub validator: Validator,
}

impl fmt::Debug for SettingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingSpec")
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

/// Options a Botling recognizes, in declaration order.
///
/// # Examples
///
/// ```
/// use drbot_botling::{SettingsSchema, validators};
/// use serde_json::json;
///
/// let schema = SettingsSchema::default()
///     .option("expiration_months", json!(6), validators::non_negative_integer())
///     .option("allow_custom", json!(true), validators::boolean());
///
/// assert_eq!(schema.names().collect::<Vec<_>>(), vec!["expiration_months", "allow_custom"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SettingsSchema {
    options: Vec<(String, SettingSpec)>,
}

impl SettingsSchema {
    /// Declare an option. Redeclaring a name replaces the earlier spec.
    pub fn option(mut self, name: impl Into<String>, default: Value, validator: Validator) -> Self {
        let name = name.into();
        let spec = SettingSpec { default, validator };
        match self.options.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = spec,
            None => self.options.push((name, spec)),
        }
        self
    }

    /// Declared option names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|(name, _)| name.as_str())
    }

    /// Spec of one option.
    pub fn spec(&self, name: &str) -> Option<&SettingSpec> {
        self.options
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, spec)| spec)
    }

    /// Number of declared options.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether the schema declares nothing.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Merge declared defaults with host overrides and validate the result.
    ///
    /// Host values the schema does not declare are kept but logged.
    /// Returns every validation failure joined into one message.
    pub fn merge(&self, botling: &str, source: &dyn SettingsSource) -> Result<BotlingSettings, String> {
        let mut values = Map::new();
        let mut failures = Vec::new();

        for (name, spec) in &self.options {
            let value = source.get(botling, name).unwrap_or_else(|| spec.default.clone());
            if let Err(message) = (spec.validator)(&value) {
                failures.push(format!("{}: {}", name, message));
            }
            values.insert(name.clone(), value);
        }

        for extra in source.options(botling) {
            if self.spec(&extra).is_none() {
                debug!(botling, option = %extra, "Host sets an option the Botling does not declare");
                if let Some(value) = source.get(botling, &extra) {
                    values.insert(extra, value);
                }
            }
        }

        if failures.is_empty() {
            Ok(BotlingSettings::new(botling, values))
        } else {
            Err(failures.join("; "))
        }
    }
}

/// A Botling's effective settings: defaults overridden by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotlingSettings {
    botling: String,
    values: Map<String, Value>,
}

impl BotlingSettings {
    /// Create from already-merged values.
    pub fn new(botling: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            botling: botling.into(),
            values,
        }
    }

    /// Raw value of an option.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Option decoded into `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> BotlingResult<T> {
        let value = self.values.get(name).cloned().ok_or_else(|| {
            BotlingError::new(BotlingErrorKind::Setting {
                name: name.to_string(),
                message: format!("not set for {}", self.botling),
            })
        })?;
        serde_json::from_value(value).map_err(|e| {
            BotlingError::new(BotlingErrorKind::Setting {
                name: name.to_string(),
                message: e.to_string(),
            })
        })
    }

    /// All merged values.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl SettingsSource for BotlingSettings {
    fn get(&self, botling: &str, option: &str) -> Option<Value> {
        (botling == self.botling)
            .then(|| self.values.get(option).cloned())
            .flatten()
    }

    fn options(&self, botling: &str) -> Vec<String> {
        if botling == self.botling {
            self.values.keys().cloned().collect()
        } else {
            Vec::new()
        }
    }
}

/// Stock validators.
pub mod validators {
    use super::Validator;
    use serde::de::DeserializeOwned;
    use serde_json::Value;
    use std::sync::Arc;

    /// Accepts `true` or `false`.
    pub fn boolean() -> Validator {
        Arc::new(|value: &Value| {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(format!("expected a boolean, got {}", value))
            }
        })
    }

    /// Accepts integers >= 0.
    pub fn non_negative_integer() -> Validator {
        Arc::new(|value: &Value| {
            if value.is_u64() {
                Ok(())
            } else {
                Err(format!("expected a non-negative integer, got {}", value))
            }
        })
    }

    /// Accepts integers >= 1.
    pub fn positive_integer() -> Validator {
        Arc::new(|value: &Value| match value.as_u64() {
            Some(n) if n > 0 => Ok(()),
            _ => Err(format!("expected a positive integer, got {}", value)),
        })
    }

    /// Accepts any string.
    pub fn string() -> Validator {
        Arc::new(|value: &Value| {
            if value.is_string() {
                Ok(())
            } else {
                Err(format!("expected a string, got {}", value))
            }
        })
    }

    /// Accepts an array whose items all pass `item`.
    pub fn array_of(item: Validator) -> Validator {
        Arc::new(move |value: &Value| -> Result<(), String> {
            let items = value
                .as_array()
                .ok_or_else(|| format!("expected an array, got {}", value))?;
            for (i, v) in items.iter().enumerate() {
                item(v).map_err(|e| format!("item {}: {}", i, e))?;
            }
            Ok(())
        })
    }

    /// Accepts any value that decodes into `T`.
    pub fn deserializes<T: DeserializeOwned + 'static>() -> Validator {
        Arc::new(|value: &Value| {
            serde_json::from_value::<T>(value.clone())
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
    }
}
