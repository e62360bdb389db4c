//! Write, find, list and delete permanent cache files.
//!
//! No index file to fsck, no lock file to contend on: the only writer of
//! a permanent name is the kernel's rename, so any partial file is always
//! under a temp name. `find`/`find_all` reconstruct the "index" on every
//! call by enumerating the directory and parsing basenames.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::{CacheConfig, UnknownFiles};
use crate::error::CacheError;
use crate::paths::{self, ParsedPerm};

/// One resolved permanent-file entry for an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermEntry {
    pub id: String,
    pub path: PathBuf,
    pub expires_at_ms: i64,
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Ensures the cache's permanent directory exists.
pub async fn setup(cfg: &CacheConfig) -> Result<(), CacheError> {
    tokio::fs::create_dir_all(&cfg.dir)
        .await
        .map_err(|e| CacheError::io(&cfg.dir, e))
}

/// Composes a fresh target path. `expires_at` is fixed to `now +
/// (ttl_override ?? cfg.ttl)` at the moment this is called — the pipeline
/// calls this once at the *start* of a write, not at commit time, so the
/// expiration reflects when writing began.
pub fn file_path(id: &str, cfg: &CacheConfig, ttl_override: Option<Duration>) -> (PathBuf, i64) {
    let ttl = ttl_override.unwrap_or(cfg.ttl);
    let expires_at_ms = now_ms() + ttl.as_millis() as i64;
    (paths::perm_path(&cfg.dir, id, expires_at_ms), expires_at_ms)
}

/// Removes a file now if it no longer parses or is known garbage, per the
/// cache's `unknown_files` policy. Errors are logged, never propagated:
/// this runs from cleaner and resolution code paths, which are always
/// best-effort.
///
/// The parse failure itself is always logged, independent of
/// `unknown_files`: `Keep` still wants the file flagged even though it's
/// left on disk.
pub async fn maybe_remove_unknown_file(path: &Path, cfg: &CacheConfig) {
    tracing::debug!(
        "FileCache ({}): unrecognized file {}",
        cfg.cache,
        path.display()
    );
    if cfg.unknown_files != UnknownFiles::Remove {
        return;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::error!("FileCache ({}): failed to remove unknown file {}: {e}", cfg.cache, path.display());
        }
    }
}

/// Unlinks `path`. `ENOENT` is mapped to success: the file may have
/// already been reclaimed by a concurrent cleaner tick or a racing `find`.
async fn unlink(path: &Path) -> Result<(), CacheError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

/// Either unlinks `path` now (`sync = true`) or hands it off to the Stale
/// Cleaner's mailbox for background removal (`sync = false`); the latter
/// is fire-and-forget and never fails from the caller's point of view.
pub async fn remove_file(path: PathBuf, cfg: &CacheConfig, sync: bool) -> Result<(), CacheError> {
    if sync {
        unlink(&path).await
    } else {
        crate::cleaners::stale::send_remove_files(&cfg.cache, vec![path]);
        Ok(())
    }
}

/// Enumerates every permanent file for `id` (or, if `id` is `None`, every
/// permanent file in the cache), parses each basename, and schedules
/// removal of every superseded or expired generation.
///
/// Returns one entry per id that has a live (non-expired) generation.
/// When `sync_clean` is true, superseded/expired files are unlinked before
/// this returns (used by the Stale Cleaner's own sweep); otherwise they
/// are handed off to the Stale Cleaner's mailbox so this call never blocks
/// on cleanup I/O (used by ordinary `find`/`find_all` reads).
pub async fn find_all(
    id: Option<&str>,
    cfg: &CacheConfig,
    sync_clean: bool,
) -> Result<HashMap<String, PermEntry>, CacheError> {
    let pattern = paths::perm_wildcard(&cfg.dir, id);
    let pattern_str = pattern.to_string_lossy().into_owned();

    let matches = tokio::task::spawn_blocking(move || -> Vec<PathBuf> {
        match glob::glob(&pattern_str) {
            Ok(paths) => paths.filter_map(|r| r.ok()).collect(),
            Err(_) => Vec::new(),
        }
    })
    .await
    .unwrap_or_default();

    let now = now_ms();
    let mut acc: HashMap<String, PermEntry> = HashMap::new();
    let mut to_remove: Vec<PathBuf> = Vec::new();
    let mut unknown: Vec<PathBuf> = Vec::new();

    for path in matches {
        let basename = match path.file_name().and_then(|n| n.to_str()) {
            Some(b) => b,
            None => continue,
        };
        let ParsedPerm { expires_at_ms, id: parsed_id } = match paths::parse_perm(basename) {
            Ok(p) => p,
            Err(_) => {
                unknown.push(path);
                continue;
            }
        };

        if expires_at_ms <= now {
            to_remove.push(path);
            continue;
        }

        match acc.get(&parsed_id) {
            Some(prev) if prev.expires_at_ms < expires_at_ms => {
                to_remove.push(prev.path.clone());
                acc.insert(
                    parsed_id.clone(),
                    PermEntry {
                        id: parsed_id,
                        path,
                        expires_at_ms,
                    },
                );
            }
            Some(_) => {
                to_remove.push(path);
            }
            None => {
                acc.insert(
                    parsed_id.clone(),
                    PermEntry {
                        id: parsed_id,
                        path,
                        expires_at_ms,
                    },
                );
            }
        }
    }

    for path in unknown {
        maybe_remove_unknown_file(&path, cfg).await;
    }

    if sync_clean {
        for path in to_remove {
            if let Err(e) = unlink(&path).await {
                tracing::error!("FileCache ({}): failed to remove stale file {}: {e}", cfg.cache, path.display());
            }
        }
    } else if !to_remove.is_empty() {
        crate::cleaners::stale::send_remove_files(&cfg.cache, to_remove);
    }

    Ok(acc)
}

/// `find(id)`: returns `acc[id]` from a `find_all` sweep scoped to `id`.
pub async fn find(id: &str, cfg: &CacheConfig, sync_clean: bool) -> Result<Option<PermEntry>, CacheError> {
    let mut acc = find_all(Some(id), cfg, sync_clean).await?;
    Ok(acc.remove(id))
}

/// Removes all permanent files whose parsed id equals `id`, synchronously.
pub async fn delete(id: &str, cfg: &CacheConfig) -> Result<(), CacheError> {
    let pattern = paths::perm_wildcard(&cfg.dir, Some(id));
    let pattern_str = pattern.to_string_lossy().into_owned();
    let id_owned = id.to_owned();

    let matches = tokio::task::spawn_blocking(move || -> Vec<PathBuf> {
        match glob::glob(&pattern_str) {
            Ok(paths) => paths.filter_map(|r| r.ok()).collect(),
            Err(_) => Vec::new(),
        }
    })
    .await
    .unwrap_or_default();

    for path in matches {
        let Some(basename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match paths::parse_perm(basename) {
            Ok(parsed) if parsed.id == id_owned => unlink(&path).await?,
            _ => {}
        }
    }
    Ok(())
}

/// `clean()`: forces a full sweep and unlinks all permanent files,
/// regardless of expiry.
pub async fn clean_all(cfg: &CacheConfig) -> Result<(), CacheError> {
    let pattern = paths::perm_wildcard(&cfg.dir, None);
    let pattern_str = pattern.to_string_lossy().into_owned();

    let matches = tokio::task::spawn_blocking(move || -> Vec<PathBuf> {
        match glob::glob(&pattern_str) {
            Ok(paths) => paths.filter_map(|r| r.ok()).collect(),
            Err(_) => Vec::new(),
        }
    })
    .await
    .unwrap_or_default();

    for path in matches {
        unlink(&path).await?;
    }
    Ok(())
}

/// `stats().current`: counts parseable permanent files regardless of
/// expiry; the Stale Cleaner's own interval governs how quickly this
/// converges to the live set.
pub async fn count_parseable(cfg: &CacheConfig) -> usize {
    let pattern = paths::perm_wildcard(&cfg.dir, None);
    let pattern_str = pattern.to_string_lossy().into_owned();

    tokio::task::spawn_blocking(move || -> usize {
        let Ok(paths) = glob::glob(&pattern_str) else {
            return 0;
        };
        paths
            .filter_map(|r| r.ok())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|b| paths::parse_perm(b).is_ok())
                    .unwrap_or(false)
            })
            .count()
    })
    .await
    .unwrap_or(0)
}
