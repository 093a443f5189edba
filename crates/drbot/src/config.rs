//! Host configuration.
//!
//! Sources, later ones winning:
//! - Bundled defaults (include_str! from drbot.toml)
//! - `~/.config/drbot/drbot.toml`
//! - `./drbot.toml`, or the file given on the command line
//! - `DRBOT_*` environment variables, `__` separating nested keys

use derive_getters::Getters;
use drbot_core::EventKind;
use drbot_error::{ConfigError, DrbotResult};
use drbot_interface::SettingsSource;
use drbot_storage::StorageConfig;
use drbot_stream::StreamConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_CONFIG: &str = include_str!("../drbot.toml");

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    level: String,
    /// Emit JSON lines instead of text
    #[serde(default)]
    json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// Main loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct SchedulerConfig {
    /// Seconds between loop wake-ups
    #[serde(default = "default_tick_secs")]
    tick_secs: u64,
    /// Dispatch every stream's events of one cycle in timestamp order
    #[serde(default)]
    merge_by_timestamp: bool,
}

fn default_tick_secs() -> u64 {
    5
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            merge_by_timestamp: false,
        }
    }
}

impl SchedulerConfig {
    /// Tick as a duration.
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }
}

/// Everything the host reads at startup.
///
/// # Examples
///
/// ```
/// use drbot::DrbotConfig;
///
/// let config = DrbotConfig::default();
/// assert!(!*config.dry_run());
/// assert_eq!(*config.requests_per_minute(), 60);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct DrbotConfig {
    /// Community the bot moderates
    #[serde(default = "default_subreddit")]
    subreddit: String,
    /// Bot account name; its own items are skipped
    #[serde(default = "default_account")]
    account: String,
    /// Log side effects instead of performing them
    #[serde(default)]
    dry_run: bool,
    /// Forum request budget
    #[serde(default = "default_requests_per_minute")]
    requests_per_minute: u32,
    /// Local checkpoint file; checkpoints live in forum documents when unset
    #[serde(default)]
    checkpoint_file: Option<PathBuf>,
    /// Log output
    #[serde(default)]
    logging: LoggingConfig,
    /// Storage adapter
    #[serde(default)]
    storage: StorageConfig,
    /// Main loop
    #[serde(default)]
    scheduler: SchedulerConfig,
    /// Per-stream polling, keyed by stream kind
    #[serde(default)]
    streams: BTreeMap<EventKind, StreamConfig>,
    /// Raw option tables, keyed by Botling name
    #[serde(default)]
    botlings: HashMap<String, Map<String, Value>>,
}

fn default_subreddit() -> String {
    "drbot_test".to_string()
}

fn default_account() -> String {
    "DrBot".to_string()
}

fn default_requests_per_minute() -> u32 {
    60
}

impl Default for DrbotConfig {
    fn default() -> Self {
        Self {
            subreddit: default_subreddit(),
            account: default_account(),
            dry_run: false,
            requests_per_minute: default_requests_per_minute(),
            checkpoint_file: None,
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            scheduler: SchedulerConfig::default(),
            streams: BTreeMap::new(),
            botlings: HashMap::new(),
        }
    }
}

impl DrbotConfig {
    /// Load from the standard locations.
    pub fn load() -> DrbotResult<Self> {
        Self::load_from(None)
    }

    /// Load with `path` in place of `./drbot.toml`.
    #[instrument]
    pub fn load_from(path: Option<&Path>) -> DrbotResult<Self> {
        debug!("Loading configuration with precedence: env > given file or current dir > home dir > bundled defaults");

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/drbot/drbot.toml");
            builder = builder.add_source(config::File::from(home_config).required(false));
        }

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("drbot").required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix("DRBOT")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document on top of the bundled defaults.
    pub fn from_toml(toml: &str) -> DrbotResult<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the host cannot run with.
    pub fn validate(&self) -> DrbotResult<()> {
        if self.account.trim().is_empty() {
            return Err(ConfigError::new("account must not be empty").into());
        }
        if *self.storage.max_document_bytes() == 0 {
            return Err(ConfigError::new("storage.max_document_bytes must be positive").into());
        }
        for (kind, stream) in &self.streams {
            if *stream.page_size() == 0 || *stream.max_pages() == 0 {
                return Err(ConfigError::new(format!(
                    "streams.{}: page_size and max_pages must be positive",
                    kind
                ))
                .into());
            }
            if *stream.max_fetch_attempts() == 0 {
                return Err(ConfigError::new(format!(
                    "streams.{}: max_fetch_attempts must be positive",
                    kind
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Polling settings for a stream, falling back to defaults.
    pub fn stream(&self, kind: EventKind) -> StreamConfig {
        self.streams.get(&kind).cloned().unwrap_or_default()
    }

    /// Botling option tables as a settings collaborator.
    pub fn host_settings(&self) -> HostSettings {
        HostSettings {
            tables: self.botlings.clone(),
        }
    }
}

/// Botling options from the configuration file.
///
/// Botling names match case-insensitively, so `[botlings.pointling]`
/// configures `Pointling`.
#[derive(Debug, Clone, Default)]
pub struct HostSettings {
    tables: HashMap<String, Map<String, Value>>,
}

impl HostSettings {
    fn table(&self, botling: &str) -> Option<&Map<String, Value>> {
        self.tables.get(botling).or_else(|| {
            self.tables
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(botling))
                .map(|(_, table)| table)
        })
    }
}

impl SettingsSource for HostSettings {
    fn get(&self, botling: &str, option: &str) -> Option<Value> {
        self.table(botling).and_then(|t| t.get(option)).cloned()
    }

    fn options(&self, botling: &str) -> Vec<String> {
        self.table(botling)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }
}
