//! Typed configuration from a TOML file and environment variables.
//!
//! Loads once at startup and fails fast on malformed values. Environment
//! variables override the file, which overrides the built-in defaults.
//! In local dev, call `dotenvy::dotenv().ok()` before loading.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::delayables::{SMART_HIGHLIGHT, SPELL_CHECK};
use crate::engine::{DEFAULT_MAX_TICK_TIME, EngineDefaults};
use crate::event::DEFAULT_EVENT_CAPACITY;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Time budget for one tick.
    pub max_tick_time: Duration,
    /// How often the host ticks while work is pending.
    pub tick_interval: Duration,
    /// Engine that adopts documents released by other engines.
    pub default_engine: Option<String>,
    /// Delayable keys enabled on every new engine.
    pub enabled: Vec<String>,
    /// Undrained events each engine keeps; zero disables events.
    pub event_capacity: usize,
    pub log_level: String,
    pub otel_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_tick_time: DEFAULT_MAX_TICK_TIME,
            tick_interval: Duration::from_millis(1),
            default_engine: None,
            enabled: vec![SPELL_CHECK.to_string(), SMART_HIGHLIGHT.to_string()],
            event_capacity: DEFAULT_EVENT_CAPACITY,
            log_level: "info".to_string(),
            otel_endpoint: None,
        }
    }
}

/// On-disk layout. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    max_tick_ms: Option<u64>,
    tick_interval_ms: Option<u64>,
    default_engine: Option<String>,
    enabled: Option<Vec<String>>,
    event_capacity: Option<usize>,
    log_level: Option<String>,
    otel_endpoint: Option<String>,
}

impl Config {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)?.with_env()
    }

    /// Parse TOML on top of the defaults, without looking at the environment.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let mut config = Self::default();
        if let Some(ms) = file.max_tick_ms {
            config.max_tick_time = Duration::from_millis(ms);
        }
        if let Some(ms) = file.tick_interval_ms {
            config.tick_interval = Duration::from_millis(ms);
        }
        if file.default_engine.is_some() {
            config.default_engine = file.default_engine;
        }
        if let Some(enabled) = file.enabled {
            config.enabled = enabled;
        }
        if let Some(capacity) = file.event_capacity {
            config.event_capacity = capacity;
        }
        if let Some(level) = file.log_level {
            config.log_level = level;
        }
        if file.otel_endpoint.is_some() {
            config.otel_endpoint = file.otel_endpoint;
        }
        Ok(config)
    }

    fn with_env(mut self) -> Result<Self> {
        if let Some(budget) = millis_var("DELAYABLE_MAX_TICK_MS")? {
            self.max_tick_time = budget;
        }
        if let Some(interval) = millis_var("DELAYABLE_TICK_INTERVAL_MS")? {
            self.tick_interval = interval;
        }
        if let Ok(name) = std::env::var("DELAYABLE_DEFAULT_ENGINE") {
            self.default_engine = Some(name).filter(|n| !n.is_empty());
        }
        if let Ok(list) = std::env::var("DELAYABLE_ENABLED") {
            self.enabled = list
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(capacity) = std::env::var("DELAYABLE_EVENT_CAPACITY") {
            self.event_capacity = capacity.trim().parse().map_err(|e| {
                Error::Config(format!("DELAYABLE_EVENT_CAPACITY must be a count: {e}"))
            })?;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(endpoint) = std::env::var("OTEL_ENDPOINT") {
            self.otel_endpoint = Some(endpoint);
        }
        Ok(self)
    }

    /// The part of the configuration engines are created from.
    pub fn engine_defaults(&self) -> EngineDefaults {
        EngineDefaults {
            max_tick_time: self.max_tick_time,
            default_engine: self.default_engine.clone(),
            enabled: self.enabled.clone(),
            event_capacity: self.event_capacity,
        }
    }
}

fn millis_var(name: &str) -> Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| Error::Config(format!("{name} must be a number of milliseconds: {e}"))),
        Err(_) => Ok(None),
    }
}
