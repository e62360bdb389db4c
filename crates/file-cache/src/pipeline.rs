//! `put` / `execute` / `get` / `delete` / `clean` / `stats` / `config`.
//!
//! Every operation here runs on the caller's own task: there is no
//! cache-owned writer lock. The only mutual exclusion is the filesystem's
//! own rename atomicity and unlink idempotence.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use file_cache_core::config::CacheConfig;
use file_cache_core::error::CacheError;
use file_cache_core::owner::OwnerToken;
use file_cache_core::{paths, permanent, registry, temp};

use crate::producer::Producer;
use crate::stream::ReadStream;

/// Per-call options: every op accepts at least `cache`; `put`/`execute`/
/// `get_record` additionally accept `ttl`.
#[derive(Debug, Clone)]
pub struct OpOptions {
    pub cache: String,
    pub ttl: Option<Duration>,
}

impl OpOptions {
    pub fn new(cache: impl Into<String>) -> Self {
        OpOptions {
            cache: cache.into(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// `get_record`'s return value: a found entry plus its metadata.
pub struct CacheRecord {
    pub id: String,
    pub path: PathBuf,
    pub expires_at_ms: i64,
    pub ttl_remaining: Duration,
    pub stream: ReadStream,
}

/// `stats()`'s return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub current: usize,
    pub in_progress: usize,
}

fn cfg_for(cache: &str) -> Result<Arc<CacheConfig>, CacheError> {
    registry::get(cache)
}

/// `put(producer, id, opts)`: unconditional write (spec.md §4.6 "Put
/// algorithm").
pub async fn put(
    producer: impl Into<Producer>,
    id: &str,
    opts: &OpOptions,
) -> Result<ReadStream, CacheError> {
    paths::validate_id(id).map_err(|_| CacheError::BadId(id.to_owned()))?;
    let cfg = cfg_for(&opts.cache)?;
    do_put(producer.into(), id, &cfg, opts.ttl, true).await
}

/// `execute(producer, id, opts)`: read-through (spec.md §4.6 "Execute
/// algorithm").
pub async fn execute(
    producer: impl Into<Producer>,
    id: &str,
    opts: &OpOptions,
) -> Result<ReadStream, CacheError> {
    paths::validate_id(id).map_err(|_| CacheError::BadId(id.to_owned()))?;
    let cfg = cfg_for(&opts.cache)?;
    match permanent::find(id, &cfg, false).await? {
        Some(entry) => Ok(ReadStream::new(entry.path)),
        None => do_put(producer.into(), id, &cfg, opts.ttl, false).await,
    }
}

/// `get(id, opts)`: look up only (spec.md §4.6 "Get algorithm").
pub async fn get(id: &str, opts: &OpOptions) -> Result<Option<ReadStream>, CacheError> {
    paths::validate_id(id).map_err(|_| CacheError::BadId(id.to_owned()))?;
    let cfg = cfg_for(&opts.cache)?;
    Ok(permanent::find(id, &cfg, false)
        .await?
        .map(|entry| ReadStream::new(entry.path)))
}

/// `get_record(id, opts)`: as `get`, plus metadata.
pub async fn get_record(id: &str, opts: &OpOptions) -> Result<Option<CacheRecord>, CacheError> {
    paths::validate_id(id).map_err(|_| CacheError::BadId(id.to_owned()))?;
    let cfg = cfg_for(&opts.cache)?;
    let Some(entry) = permanent::find(id, &cfg, false).await? else {
        return Ok(None);
    };
    let remaining_ms = (entry.expires_at_ms - permanent::now_ms()).max(0) as u64;
    Ok(Some(CacheRecord {
        id: entry.id,
        path: entry.path.clone(),
        expires_at_ms: entry.expires_at_ms,
        ttl_remaining: Duration::from_millis(remaining_ms),
        stream: ReadStream::new(entry.path),
    }))
}

/// `exists(id, opts)`.
pub async fn exists(id: &str, opts: &OpOptions) -> Result<bool, CacheError> {
    paths::validate_id(id).map_err(|_| CacheError::BadId(id.to_owned()))?;
    let cfg = cfg_for(&opts.cache)?;
    Ok(permanent::find(id, &cfg, false).await?.is_some())
}

/// `delete(id, opts)`: purges all generations for this id (spec.md §4.6
/// "Delete algorithm"). Does not interrupt an in-flight producer writing
/// the same id; a writer that commits afterwards republishes it, which is
/// documented behavior (spec.md §5).
pub async fn delete(id: &str, opts: &OpOptions) -> Result<(), CacheError> {
    paths::validate_id(id).map_err(|_| CacheError::BadId(id.to_owned()))?;
    let cfg = cfg_for(&opts.cache)?;
    permanent::delete(id, &cfg).await
}

/// `clean(opts)`: forces a full sweep, unlinking every permanent file
/// regardless of expiry.
pub async fn clean(opts: &OpOptions) -> Result<(), CacheError> {
    let cfg = cfg_for(&opts.cache)?;
    permanent::clean_all(&cfg).await
}

/// `stats(opts)`.
pub async fn stats(opts: &OpOptions) -> Result<Stats, CacheError> {
    let cfg = cfg_for(&opts.cache)?;
    let current = permanent::count_parseable(&cfg).await;
    let in_progress = temp::count_parseable(&cfg).await;
    Ok(Stats {
        current,
        in_progress,
    })
}

/// `config(opts)`.
pub fn config(opts: &OpOptions) -> Result<Arc<CacheConfig>, CacheError> {
    cfg_for(&opts.cache)
}

async fn ensure_parent(path: &Path) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CacheError::io(parent, e))?;
    }
    Ok(())
}

/// Implements spec.md §4.6 "Put algorithm" steps 2-8. `preclean` is on by
/// default for `put` and off inside `execute` (its own `find` already
/// swept).
async fn do_put(
    producer: Producer,
    id: &str,
    cfg: &CacheConfig,
    ttl: Option<Duration>,
    preclean: bool,
) -> Result<ReadStream, CacheError> {
    if preclean {
        file_cache_core::cleaners::stale::send_clean(&cfg.cache, id.to_owned());
    }

    let task_seq = OwnerToken::next_task_seq();
    let owner = Arc::new(OwnerToken::for_current_process(task_seq));
    let _owner_guard = owner.register();

    let temp_path = temp::file_path(id, cfg, &owner);
    // expiry is fixed at the start of the write, not at commit (spec.md §4.6 step 4)
    let (perm_path, _expires_at_ms) = permanent::file_path(id, cfg, ttl);

    ensure_parent(&temp_path).await?;

    if let Err(e) = write_producer_to_temp(producer, &temp_path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    ensure_parent(&perm_path).await?;

    if let Err(rename_err) = tokio::fs::rename(&temp_path, &perm_path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(CacheError::RenameFailed {
            from: temp_path,
            to: perm_path,
            source: rename_err,
        });
    }

    // Post-commit hint so the previous generation is removed promptly.
    file_cache_core::cleaners::stale::send_clean(&cfg.cache, id.to_owned());

    Ok(ReadStream::new(perm_path))
}

async fn write_producer_to_temp(producer: Producer, path: &Path) -> Result<(), CacheError> {
    let mut stream = producer.into_stream().await.map_err(CacheError::from)?;
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| CacheError::io(path, e))?;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(CacheError::from)?;
        file.write_all(&chunk)
            .await
            .map_err(|e| CacheError::io(path, e))?;
    }
    file.flush().await.map_err(|e| CacheError::io(path, e))?;
    Ok(())
}
