//! Process-wide store of per-cache config.
//!
//! Modeled as a read-mostly concurrent map keyed by cache name, written
//! once at `start` time. A single `RwLock<HashMap<..>>` would serialize
//! every cache operation's config lookup behind one lock, so this reaches
//! for a sharded concurrent map (`dashmap`) instead, keeping reads
//! lock-free once a cache has been published.

use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;

use crate::config::CacheConfig;
use crate::error::CacheError;

lazy_static! {
    static ref REGISTRY: DashMap<String, Arc<CacheConfig>> = DashMap::new();
}

/// Publishes a cache's resolved config. Called once, from `Supervisor::start`.
pub fn store(config: CacheConfig) {
    REGISTRY.insert(config.cache.clone(), Arc::new(config));
}

/// Returns the whole config or fails with `unknown_cache`.
pub fn get(name: &str) -> Result<Arc<CacheConfig>, CacheError> {
    REGISTRY
        .get(name)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| CacheError::UnknownCache(name.to_owned()))
}

/// Returns one field or fails with `unknown_config_key` (or `unknown_cache`
/// if the cache itself isn't registered).
pub fn get_field(name: &str, key: &str) -> Result<crate::config::ConfigValue, CacheError> {
    get(name)?.field(key)
}

/// Removes a cache's config, e.g. on graceful shutdown.
pub fn remove(name: &str) {
    REGISTRY.remove(name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnknownFiles;
    use serial_test::serial;
    use std::time::Duration;

    fn sample(name: &str) -> CacheConfig {
        CacheConfig {
            cache: name.to_owned(),
            dir: format!("/tmp/{name}").into(),
            temp_dir: format!("/tmp/{name}-tmp").into(),
            ttl: Duration::from_secs(1),
            stale_clean_interval: Duration::from_secs(1),
            temp_clean_interval: Duration::from_secs(1),
            unknown_files: UnknownFiles::Keep,
            verbose: false,
        }
    }

    #[test]
    #[serial]
    fn unknown_cache_before_store() {
        remove("registry-test-a");
        assert!(matches!(get("registry-test-a"), Err(CacheError::UnknownCache(_))));
    }

    #[test]
    #[serial]
    fn store_then_get_round_trips() {
        store(sample("registry-test-b"));
        let cfg = get("registry-test-b").unwrap();
        assert_eq!(cfg.cache, "registry-test-b");
        remove("registry-test-b");
    }
}
