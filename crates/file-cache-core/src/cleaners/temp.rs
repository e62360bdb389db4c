//! Periodic sweep of orphaned temp files.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::CacheConfig;
use crate::owner::OwnerToken;
use crate::permanent::maybe_remove_unknown_file;
use crate::temp;

async fn sweep(cfg: &CacheConfig) {
    if cfg.verbose {
        tracing::info!("FileCache ({}): Starting temp cleanup for {}", cfg.cache, cfg.cache);
    }

    for path in temp::list(cfg).await {
        match temp::parse_filepath(&path) {
            Err(_) => maybe_remove_unknown_file(&path, cfg).await,
            Ok(parsed) => {
                if !OwnerToken::is_alive(&parsed.owner) {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            tracing::error!(
                                "FileCache ({}): failed to remove orphaned temp file {}: {e}",
                                cfg.cache,
                                path.display()
                            );
                        }
                    }
                }
                // Files of living owners are preserved.
            }
        }
    }
}

/// Spawns the Temp Cleaner task for `cfg`. Returns a join handle plus a
/// shutdown sender, mirroring [`super::stale::spawn`].
pub fn spawn(cfg: Arc<CacheConfig>) -> (JoinHandle<()>, watch::Sender<()>) {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(());

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(cfg.temp_clean_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    sweep(&cfg).await;
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }
    });

    (handle, shutdown_tx)
}
