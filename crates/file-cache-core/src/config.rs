//! Configuration surface: the schema `start` validates and publishes, and
//! the resolved, process-wide config each cache operation reads back.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};

use crate::error::CacheError;

/// What to do with a file in a cache directory whose name does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFiles {
    /// Leave it alone. The conservative default: a foreign file might be
    /// something an operator placed there deliberately (e.g. a `.gitkeep`).
    #[default]
    Keep,
    Remove,
}

fn default_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_stale_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_temp_interval() -> Duration {
    Duration::from_secs(60)
}

/// The data-only part of the schema `start(opts)` validates. Namespace
/// specs are deliberately not part of this struct: a
/// `NamespaceSpec::Fn`/`Call` wraps a Rust closure, which cannot be
/// deserialized from a config file, so callers that need dynamic
/// namespacing build a [`crate::namespace::NamespaceSpec`] in code and pass
/// it alongside this struct (see `file_cache::supervisor::start`).
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct CacheOptions {
    /// Cache name; must be a valid directory segment.
    pub cache: String,
    /// Root of permanent files; created on startup.
    pub dir: PathBuf,
    /// Root of temp files; created on startup.
    pub temp_dir: PathBuf,
    /// Default milliseconds added to `now` to form `expires_at`.
    #[serde(default = "default_ttl")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub ttl: Duration,
    /// Period of the Stale Cleaner (ms).
    #[serde(default = "default_stale_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub stale_clean_interval: Duration,
    /// Period of the Temp Cleaner (ms).
    #[serde(default = "default_temp_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub temp_clean_interval: Duration,
    /// Policy for files whose name does not parse.
    #[serde(default)]
    pub unknown_files: UnknownFiles,
    /// Emit info-level logs around each cleaner pass.
    #[serde(default)]
    pub verbose: bool,
}

fn validate_cache_name(name: &str) -> Result<(), CacheError> {
    let ok = !name.is_empty() && name.is_ascii() && !name.contains('/') && !name.contains('\\');
    if ok {
        Ok(())
    } else {
        Err(CacheError::BadCacheName(name.to_owned()))
    }
}

impl CacheOptions {
    pub fn validate(&self) -> Result<(), CacheError> {
        validate_cache_name(&self.cache)
    }
}

/// One field of a [`CacheConfig`], returned by `get(name, key)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Str(String),
    Path(PathBuf),
    MillisU128(u128),
    Bool(bool),
}

/// The resolved, process-wide, read-mostly config for one named cache.
/// `dir`/`temp_dir` here are the *fully resolved* roots — i.e. the
/// configured root joined with the resolved namespace fragment and the
/// cache name — so every other component can join a filename onto them
/// directly.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache: String,
    pub dir: PathBuf,
    pub temp_dir: PathBuf,
    pub ttl: Duration,
    pub stale_clean_interval: Duration,
    pub temp_clean_interval: Duration,
    pub unknown_files: UnknownFiles,
    pub verbose: bool,
}

impl CacheConfig {
    /// `get(name, key)`: returns one field or fails with `unknown_config_key`.
    pub fn field(&self, key: &str) -> Result<ConfigValue, CacheError> {
        Ok(match key {
            "cache" => ConfigValue::Str(self.cache.clone()),
            "dir" => ConfigValue::Path(self.dir.clone()),
            "temp_dir" => ConfigValue::Path(self.temp_dir.clone()),
            "ttl" => ConfigValue::MillisU128(self.ttl.as_millis()),
            "stale_clean_interval" => ConfigValue::MillisU128(self.stale_clean_interval.as_millis()),
            "temp_clean_interval" => ConfigValue::MillisU128(self.temp_clean_interval.as_millis()),
            "unknown_files" => ConfigValue::Bool(self.unknown_files == UnknownFiles::Remove),
            "verbose" => ConfigValue::Bool(self.verbose),
            other => {
                return Err(CacheError::UnknownConfigKey {
                    cache: self.cache.clone(),
                    key: other.to_owned(),
                })
            }
        })
    }
}
