//! Configuration Module
//!
//! Per-model cache settings, cache-wide options, and process configuration
//! loaded from environment variables.

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::cache::{
    log_delegate, Clock, StatsDelegate, SystemClock, Ttl, DEFAULT_SIZE_LIMIT, DEFAULT_TTL_SECS,
};
use crate::error::{CacheError, Result};

/// Read operations cached when a model does not list its own.
pub const DEFAULT_CACHEABLE_OPERATIONS: &[&str] = &[
    "find_all",
    "find_one",
    "find_by_pk",
    "find_and_count_all",
    "count",
    "max",
    "min",
    "sum",
];

/// Write operations that invalidate when a model does not list its own.
pub const DEFAULT_INVALIDATING_OPERATIONS: &[&str] = &[
    "create",
    "bulk_create",
    "update",
    "upsert",
    "destroy",
    "restore",
    "increment",
    "decrement",
    "truncate",
    "find_or_create",
];

// == Model Config ==
/// Cache settings for one model. Immutable once handed to the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Lifetime of cached results
    pub ttl: Ttl,
    /// Operations whose results are cached
    pub cacheable_operations: HashSet<String>,
    /// Operations that clear the cache when accessed
    pub invalidating_operations: HashSet<String>,
    /// Entry count above which a purge runs (at least 1)
    pub size_limit: usize,
    /// Whether invalidating operations clear anything at all
    pub clear_on_write: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            ttl: Ttl::from_secs(DEFAULT_TTL_SECS),
            cacheable_operations: to_set(DEFAULT_CACHEABLE_OPERATIONS),
            invalidating_operations: to_set(DEFAULT_INVALIDATING_OPERATIONS),
            size_limit: DEFAULT_SIZE_LIMIT,
            clear_on_write: true,
        }
    }
}

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TTL.
    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the TTL in seconds; zero or negative means never expire.
    pub fn with_ttl_secs(self, secs: i64) -> Self {
        self.with_ttl(Ttl::from_secs(secs))
    }

    /// Replace the cacheable operation list.
    pub fn with_cacheable<I, S>(mut self, operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cacheable_operations = operations.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the invalidating operation list.
    pub fn with_invalidating<I, S>(mut self, operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invalidating_operations = operations.into_iter().map(Into::into).collect();
        self
    }

    /// Set the size limit. Values below 1 are raised to 1.
    pub fn with_size_limit(mut self, limit: usize) -> Self {
        self.size_limit = limit.max(1);
        self
    }

    pub fn with_clear_on_write(mut self, clear: bool) -> Self {
        self.clear_on_write = clear;
        self
    }
}

fn to_set(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// == File Format ==
/// `ttl` as written in a configuration file: seconds (fractions allowed), or
/// `false` for never.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum TtlSetting {
    Seconds(f64),
    Enabled(bool),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ModelConfigFile {
    ttl: Option<TtlSetting>,
    cacheable_operations: Option<Vec<String>>,
    invalidating_operations: Option<Vec<String>>,
    size_limit: Option<usize>,
    clear_on_write: Option<bool>,
}

impl ModelConfigFile {
    fn into_config(self, model: &str) -> Result<ModelConfig> {
        let mut config = ModelConfig::default();
        match self.ttl {
            Some(TtlSetting::Seconds(secs)) => config.ttl = Ttl::from_secs_f64(secs),
            Some(TtlSetting::Enabled(false)) => config.ttl = Ttl::Never,
            Some(TtlSetting::Enabled(true)) | None => {}
        }
        if let Some(ops) = self.cacheable_operations {
            config = config.with_cacheable(ops);
        }
        if let Some(ops) = self.invalidating_operations {
            config = config.with_invalidating(ops);
        }
        if let Some(limit) = self.size_limit {
            if limit == 0 {
                return Err(CacheError::Config(format!(
                    "size_limit for {} must be greater than 0",
                    model
                )));
            }
            config.size_limit = limit;
        }
        if let Some(clear) = self.clear_on_write {
            config.clear_on_write = clear;
        }
        Ok(config)
    }
}

// == Cache Configuration ==
/// Per-model settings; models absent here are not cached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheConfiguration {
    models: BTreeMap<String, ModelConfig>,
}

impl CacheConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the settings for `model`.
    pub fn with_model(mut self, model: impl Into<String>, config: ModelConfig) -> Self {
        self.models.insert(model.into(), config);
        self
    }

    /// Parses a JSON object mapping model names to their settings.
    ///
    /// ```json
    /// { "User": { "ttl": 5 }, "Audit": { "ttl": false, "size_limit": 500 } }
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, ModelConfigFile> =
            serde_json::from_str(json).map_err(|e| CacheError::Config(e.to_string()))?;

        let mut models = BTreeMap::new();
        for (name, file) in raw {
            let config = file.into_config(&name)?;
            models.insert(name, config);
        }
        Ok(Self { models })
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_file(path: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CacheError::Config(format!("{}: {}", path, e)))?;
        Self::from_json(&json)
    }

    pub fn get(&self, model: &str) -> Option<&ModelConfig> {
        self.models.get(model)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModelConfig)> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

// == Cache Options ==
/// Cache-wide behaviour.
#[derive(Clone)]
pub struct CacheOptions {
    /// Report every stats event to the delegate, not only heartbeats
    pub verbose: bool,
    /// Heartbeat period in seconds, 0 disables it
    pub heartbeat_interval_secs: u64,
    /// Receiver of stats reports
    pub delegate: StatsDelegate,
    /// Time source for expiry
    pub clock: Arc<dyn Clock>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            heartbeat_interval_secs: 0,
            delegate: log_delegate(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_heartbeat_interval(mut self, secs: u64) -> Self {
        self.heartbeat_interval_secs = secs;
        self
    }

    pub fn with_delegate(mut self, delegate: StatsDelegate) -> Self {
        self.delegate = delegate;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("verbose", &self.verbose)
            .field("heartbeat_interval_secs", &self.heartbeat_interval_secs)
            .finish_non_exhaustive()
    }
}

// == Process Config ==
/// Process configuration for the `model-cache` binary.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Report every stats event, not only heartbeats
    pub verbose: bool,
    /// Heartbeat period in seconds, 0 = off
    pub heartbeat_interval: u64,
    /// Admin HTTP port
    pub admin_port: u16,
    /// Path of the JSON model configuration, if any
    pub config_path: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MODEL_CACHE_VERBOSE` - Report every stats event (default: false)
    /// - `MODEL_CACHE_HEARTBEAT_SECS` - Heartbeat period in seconds (default: 0, off)
    /// - `MODEL_CACHE_ADMIN_PORT` - Admin HTTP port (default: 3000)
    /// - `MODEL_CACHE_CONFIG` - Path to the JSON model configuration (default: none)
    pub fn from_env() -> Self {
        Self {
            verbose: env::var("MODEL_CACHE_VERBOSE")
                .ok()
                .map(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
            heartbeat_interval: env::var("MODEL_CACHE_HEARTBEAT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            admin_port: env::var("MODEL_CACHE_ADMIN_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            config_path: env::var("MODEL_CACHE_CONFIG")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }

    /// Loads the model configuration this process points at.
    pub fn load_models(&self) -> Result<CacheConfiguration> {
        match &self.config_path {
            Some(path) => CacheConfiguration::from_file(path),
            None => Ok(CacheConfiguration::new()),
        }
    }

    /// Cache options derived from this configuration.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions::new()
            .with_verbose(self.verbose)
            .with_heartbeat_interval(self.heartbeat_interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: false,
            heartbeat_interval: 0,
            admin_port: 3000,
            config_path: None,
        }
    }
}
