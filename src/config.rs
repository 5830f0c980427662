//! Store configuration with optional overrides from `.kanban/config.yaml`.

use crate::storage::KANBAN_DIR;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Config file name within the .kanban directory.
pub const CONFIG_FILE: &str = "config.yaml";

/// Default time SQLite waits on a locked database before reporting busy.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Default number of times a conflicting operation is retried.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default per-board event buffer.
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Runtime configuration for a store and its daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// How long a writer waits for the database lock
    pub busy_timeout: Duration,

    /// Retries after a concurrency conflict before giving up
    pub max_retries: u32,

    /// Buffered events per board before slow subscribers start lagging
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// On-disk form; every field is optional.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    busy_timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    event_capacity: Option<usize>,
}

impl Config {
    /// Create config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config for a store root, falling back to defaults when no file exists.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(KANBAN_DIR).join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_yaml(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
        log::debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Parse config from YAML text, applying defaults for missing keys.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let file: ConfigFile = if text.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(text)?
        };

        let defaults = Self::default();
        let config = Self {
            busy_timeout: file
                .busy_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.busy_timeout),
            max_retries: file.max_retries.unwrap_or(defaults.max_retries),
            event_capacity: file.event_capacity.unwrap_or(defaults.event_capacity),
        };

        if config.event_capacity == 0 {
            eyre::bail!("event_capacity must be greater than zero");
        }

        Ok(config)
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set the retry bound.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}
