//! Allocate and enumerate temp staging files.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::owner::OwnerToken;
use crate::paths::{self, ParsedTemp};

static FRESH_UNIQUE: AtomicU64 = AtomicU64::new(0);

/// A globally-unique-enough (per process) allocation id, scoped to the
/// cache process.
pub fn fresh_unique() -> u64 {
    FRESH_UNIQUE.fetch_add(1, Ordering::Relaxed)
}

/// Ensures the cache's temp directory exists.
pub async fn setup(cfg: &CacheConfig) -> Result<(), CacheError> {
    tokio::fs::create_dir_all(&cfg.temp_dir)
        .await
        .map_err(|e| CacheError::io(&cfg.temp_dir, e))
}

/// Composes a fresh staging path for `id`, owned by `owner`.
pub fn file_path(id: &str, cfg: &CacheConfig, owner: &OwnerToken) -> PathBuf {
    paths::temp_path(&cfg.temp_dir, id, owner, fresh_unique())
}

/// The glob pattern matching every temp file for the cache.
pub fn wildcard(cfg: &CacheConfig) -> PathBuf {
    paths::temp_wildcard(&cfg.temp_dir)
}

/// Enumerates every temp file currently on disk for the cache.
pub async fn list(cfg: &CacheConfig) -> Vec<PathBuf> {
    let pattern = wildcard(cfg).to_string_lossy().into_owned();
    tokio::task::spawn_blocking(move || -> Vec<PathBuf> {
        match glob::glob(&pattern) {
            Ok(paths) => paths.filter_map(|r| r.ok()).collect(),
            Err(_) => Vec::new(),
        }
    })
    .await
    .unwrap_or_default()
}

/// Parses a temp file's basename, used by the Temp Cleaner to decide
/// whether the owning producer is still alive.
pub fn parse_filepath(path: &Path) -> Result<ParsedTemp, crate::error::ParseError> {
    let basename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(crate::error::ParseError::BadFormat { sep: paths::SEP })?;
    paths::parse_temp(basename)
}

/// Counts temp files whose basename actually parses, mirroring
/// `permanent::count_parseable` so `stats().in_progress` reports in-flight
/// producers rather than every glob match (foreign files included).
pub async fn count_parseable(cfg: &CacheConfig) -> usize {
    list(cfg)
        .await
        .iter()
        .filter(|path| parse_filepath(path).is_ok())
        .count()
}
