//! Start/stop cleaners and register the cache (spec.md §4.9).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use file_cache_core::config::{CacheConfig, CacheOptions};
use file_cache_core::error::CacheError;
use file_cache_core::namespace::{self, NamespaceSpec};
use file_cache_core::{cleaners, permanent, registry, temp};

/// A running named cache. Dropping this without calling [`shutdown`] is
/// fine: the cleaner tasks keep running (and stay reachable by name)
/// until the process exits or `shutdown` is called explicitly, matching
/// spec.md §4.9 ("on shutdown, cancel cleaner timers; in-flight writers
/// are not interrupted").
pub struct CacheHandle {
    name: String,
    stale_shutdown: watch::Sender<()>,
    temp_shutdown: watch::Sender<()>,
    supervisor: JoinHandle<()>,
}

impl CacheHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancels both cleaners' timers and removes the cache from the
    /// Config Registry. In-flight writers are not interrupted; their temp
    /// files are removed on their own failure paths or later swept by
    /// whatever process eventually runs a Temp Cleaner over this
    /// directory.
    pub async fn shutdown(self) {
        let _ = self.stale_shutdown.send(());
        let _ = self.temp_shutdown.send(());
        let _ = self.supervisor.await;
        registry::remove(&self.name);
    }
}

fn join_namespace(root: &Path, namespace_fragment: &str, cache: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in namespace_fragment.split('/').filter(|p| !p.is_empty()) {
        path.push(part);
    }
    path.push(cache);
    path
}

/// Spawns a cleaner with one-for-one restart: if the cleaner task panics,
/// only that cleaner is respawned, not the other one or the cache itself
/// (spec.md §4.9 step 4). Returns the fused join handle for the
/// supervising loop plus a shutdown sender that both cancels the loop and
/// forwards the cancellation to whichever cleaner generation is current.
fn supervise_one_for_one<F>(
    cfg: Arc<CacheConfig>,
    label: &'static str,
    spawn_child: F,
) -> (JoinHandle<()>, watch::Sender<()>)
where
    F: Fn(Arc<CacheConfig>) -> (JoinHandle<()>, watch::Sender<()>) + Send + Sync + 'static,
{
    let (outer_tx, mut outer_rx) = watch::channel(());
    let handle = tokio::spawn(async move {
        loop {
            let (child, child_shutdown) = spawn_child(cfg.clone());
            tokio::select! {
                result = child => {
                    match result {
                        Ok(()) => break, // cooperative shutdown of this generation
                        Err(join_err) => {
                            tracing::error!(
                                "FileCache ({}): {label} cleaner task crashed ({join_err}), restarting"
                            );
                            continue;
                        }
                    }
                }
                _ = outer_rx.changed() => {
                    let _ = child_shutdown.send(());
                    break;
                }
            }
        }
    });
    (handle, outer_tx)
}

/// `start(opts)` (spec.md §4.9):
/// 1. validates `opts` against the schema,
/// 2. resolves `namespace`/`temp_namespace` and publishes the resulting
///    config to the Config Registry,
/// 3. creates both directories,
/// 4. launches a Temp Cleaner and a Stale Cleaner as supervised children.
///
/// `namespace`/`temp_namespace` are passed separately from `opts` because
/// a [`NamespaceSpec::Fn`]/`Call` wraps a Rust closure and cannot be part
/// of a `Deserialize` config struct (see `file-cache-core::config`'s doc
/// comment); pass [`NamespaceSpec::Empty`] for no dynamic namespacing.
pub async fn start(
    opts: CacheOptions,
    namespace: NamespaceSpec,
    temp_namespace: NamespaceSpec,
) -> Result<CacheHandle, CacheError> {
    opts.validate()?;

    let ns_fragment = namespace::resolve(&namespace)?;
    let temp_ns_fragment = namespace::resolve(&temp_namespace)?;

    let cfg = CacheConfig {
        cache: opts.cache.clone(),
        dir: join_namespace(&opts.dir, &ns_fragment, &opts.cache),
        temp_dir: join_namespace(&opts.temp_dir, &temp_ns_fragment, &opts.cache),
        ttl: opts.ttl,
        stale_clean_interval: opts.stale_clean_interval,
        temp_clean_interval: opts.temp_clean_interval,
        unknown_files: opts.unknown_files,
        verbose: opts.verbose,
    };

    registry::store(cfg.clone());

    // setup() failures should not leave a half-registered cache behind.
    if let Err(e) = permanent::setup(&cfg).await {
        registry::remove(&cfg.cache);
        return Err(e);
    }
    if let Err(e) = temp::setup(&cfg).await {
        registry::remove(&cfg.cache);
        return Err(e);
    }

    let cfg = Arc::new(cfg);

    let (stale_handle, stale_shutdown) =
        supervise_one_for_one(cfg.clone(), "stale", |cfg| cleaners::stale::spawn(cfg));
    let (temp_handle, temp_shutdown) =
        supervise_one_for_one(cfg.clone(), "temp", |cfg| cleaners::temp::spawn(cfg));

    // Fuse the two supervising loops into one handle the `CacheHandle`
    // can join on at shutdown.
    let supervisor = tokio::spawn(async move {
        let _ = tokio::join!(stale_handle, temp_handle);
    });

    Ok(CacheHandle {
        name: cfg.cache.clone(),
        stale_shutdown,
        temp_shutdown,
        supervisor,
    })
}
