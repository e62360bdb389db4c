//! Periodic sweep of expired/superseded permanent files.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::CacheConfig;
use crate::permanent;

/// Inbound messages the Stale Cleaner's mailbox accepts.
pub enum StaleMsg {
    /// Synchronously unlink each of these paths.
    RemoveFiles(Vec<PathBuf>),
    /// Run a sweep scoped to one id.
    Clean(String),
}

const MAILBOX_CAPACITY: usize = 1024;

lazy_static! {
    /// Maps cache name to its Stale Cleaner's mailbox, so any writer can
    /// send a removal hint without holding a reference to the task.
    static ref HANDLES: DashMap<String, mpsc::Sender<StaleMsg>> = DashMap::new();
}

/// Sends `remove_files` to the named cache's Stale Cleaner. Fire-and-forget:
/// if the mailbox is full or the cleaner isn't running, the hint is simply
/// dropped — a later sweep will pick up whatever it missed.
pub fn send_remove_files(cache: &str, paths: Vec<PathBuf>) {
    if paths.is_empty() {
        return;
    }
    if let Some(tx) = HANDLES.get(cache) {
        let _ = tx.try_send(StaleMsg::RemoveFiles(paths));
    }
}

/// Sends `clean(id)` to the named cache's Stale Cleaner.
pub fn send_clean(cache: &str, id: String) {
    if let Some(tx) = HANDLES.get(cache) {
        let _ = tx.try_send(StaleMsg::Clean(id));
    }
}

async fn handle_message(msg: StaleMsg, cfg: &CacheConfig) {
    match msg {
        StaleMsg::RemoveFiles(paths) => {
            for path in paths {
                if let Err(e) = permanent::remove_file(path.clone(), cfg, true).await {
                    tracing::error!(
                        "FileCache ({}): failed to remove {}: {e}",
                        cfg.cache,
                        path.display()
                    );
                }
            }
        }
        StaleMsg::Clean(id) => {
            if let Err(e) = permanent::find_all(Some(&id), cfg, true).await {
                tracing::error!("FileCache ({}): clean({id}) failed: {e}", cfg.cache);
            }
        }
    }
}

/// Spawns the Stale Cleaner task for `cfg`. Returns a join handle plus a
/// shutdown sender; dropping or sending on the shutdown channel cancels
/// the cleaner's timer without touching in-flight writers.
pub fn spawn(cfg: Arc<CacheConfig>) -> (JoinHandle<()>, watch::Sender<()>) {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(());
    let (tx, mut rx) = mpsc::channel(MAILBOX_CAPACITY);
    HANDLES.insert(cfg.cache.clone(), tx);

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(cfg.stale_clean_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if cfg.verbose {
                        tracing::info!("FileCache ({}): Starting stale cleanup for {}", cfg.cache, cfg.cache);
                    }
                    if let Err(e) = permanent::find_all(None, &cfg, true).await {
                        tracing::error!("FileCache ({}): stale sweep failed: {e}", cfg.cache);
                    }
                }
                Some(msg) = rx.recv() => {
                    handle_message(msg, &cfg).await;
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }

        HANDLES.remove(&cfg.cache);
    });

    (handle, shutdown_tx)
}
