//! End-to-end scenarios, one test per literal scenario in spec.md §8.

use std::time::Duration;

use bytes::Bytes;
use file_cache::{CacheOptions, NamespaceSpec, OpOptions, Producer, UnknownFiles};
use tempfile::tempdir;

/// Installs a `tracing_subscriber` writer so `verbose`-mode cleaner logs
/// ("Starting stale cleanup for ...", "Starting temp cleanup for ...") are
/// visible on `cargo test -- --nocapture`, instead of vanishing into the
/// void with no subscriber installed. Safe to call from every test: the
/// second and later calls are no-ops.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn opts_for(name: &str, dir: &std::path::Path, ttl: Duration) -> CacheOptions {
    CacheOptions {
        cache: name.to_owned(),
        dir: dir.join("perm"),
        temp_dir: dir.join("temp"),
        ttl,
        stale_clean_interval: Duration::from_millis(50),
        temp_clean_interval: Duration::from_millis(50),
        unknown_files: UnknownFiles::Keep,
        verbose: false,
    }
}

#[tokio::test]
async fn miss_then_hit() {
    init_tracing();
    let dir = tempdir().unwrap();
    let opts = opts_for("miss-then-hit", dir.path(), Duration::from_secs(3600));
    let handle = file_cache::start(opts, NamespaceSpec::Empty, NamespaceSpec::Empty)
        .await
        .unwrap();

    let op = OpOptions::new("miss-then-hit");
    assert!(file_cache::get("k", &op).await.unwrap().is_none());

    let stream = file_cache::put("hello".to_owned(), "k", &op).await.unwrap();
    assert_eq!(stream.read_to_vec().await.unwrap(), b"hello");

    let stream = file_cache::get("k", &op).await.unwrap().unwrap();
    assert_eq!(stream.read_to_vec().await.unwrap(), b"hello");

    handle.shutdown().await;
}

#[tokio::test]
async fn stale_file_is_auto_swept() {
    init_tracing();
    let dir = tempdir().unwrap();
    let opts = opts_for("stale-sweep", dir.path(), Duration::from_millis(100));
    let handle = file_cache::start(opts, NamespaceSpec::Empty, NamespaceSpec::Empty)
        .await
        .unwrap();

    let op = OpOptions::new("stale-sweep");
    file_cache::put("v".to_owned(), "k", &op).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(file_cache::get("k", &op).await.unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(500)).await;
    let stats = file_cache::stats(&op).await.unwrap();
    assert_eq!(stats.current, 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn newer_generation_supersedes_older() {
    init_tracing();
    let dir = tempdir().unwrap();
    let opts = opts_for("supersession", dir.path(), Duration::from_secs(3600));
    let handle = file_cache::start(opts, NamespaceSpec::Empty, NamespaceSpec::Empty)
        .await
        .unwrap();

    let op = OpOptions::new("supersession");
    file_cache::put("old".to_owned(), "k", &op).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    file_cache::put("new".to_owned(), "k", &op).await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    let stats = file_cache::stats(&op).await.unwrap();
    assert_eq!(stats.current, 1);

    let stream = file_cache::get("k", &op).await.unwrap().unwrap();
    assert_eq!(stream.read_to_vec().await.unwrap(), b"new");

    handle.shutdown().await;
}

#[derive(Debug)]
struct Explode;
impl std::fmt::Display for Explode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "explode")
    }
}
impl std::error::Error for Explode {}

#[tokio::test]
async fn producer_failure_leaves_no_trace() {
    init_tracing();
    let dir = tempdir().unwrap();
    let opts = opts_for("producer-crash", dir.path(), Duration::from_secs(3600));
    let handle = file_cache::start(opts, NamespaceSpec::Empty, NamespaceSpec::Empty)
        .await
        .unwrap();

    let op = OpOptions::new("producer-crash");

    let chunks = vec![
        Ok(Bytes::from_static(b"a")),
        Ok(Bytes::from_static(b"b")),
        Ok(Bytes::from_static(b"c")),
        Ok(Bytes::from_static(b"d")),
        Err(file_cache_core::error::ProducerError(Box::new(Explode))),
    ];
    let producer = Producer::stream(futures::stream::iter(chunks));

    let result = file_cache::put(producer, "k", &op).await;
    assert!(result.is_err());

    assert!(file_cache::get("k", &op).await.unwrap().is_none());

    let stats = file_cache::stats(&op).await.unwrap();
    assert_eq!(stats.current, 0);
    assert_eq!(stats.in_progress, 0);

    handle.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn rename_failure_cleans_up_temp_file() {
    use std::os::unix::fs::PermissionsExt;

    init_tracing();
    let dir = tempdir().unwrap();
    let opts = opts_for("rename-failure", dir.path(), Duration::from_secs(3600));
    let handle = file_cache::start(opts, NamespaceSpec::Empty, NamespaceSpec::Empty)
        .await
        .unwrap();

    let op = OpOptions::new("rename-failure");
    let cfg = file_cache::config(&op).unwrap();

    // Make the permanent directory read-only after startup, so the rename
    // in step 6 of the put algorithm fails with a permissions error.
    let mut perms = std::fs::metadata(&cfg.dir).unwrap().permissions();
    perms.set_mode(0o500);
    std::fs::set_permissions(&cfg.dir, perms.clone()).unwrap();

    let result = file_cache::put(Vec::new(), "k", &op).await;
    assert!(matches!(result, Err(file_cache::CacheError::RenameFailed { .. })));

    // restore permissions so tempdir cleanup can remove the directory
    perms.set_mode(0o700);
    std::fs::set_permissions(&cfg.dir, perms).unwrap();

    let temp_files = std::fs::read_dir(&cfg.temp_dir).unwrap().count();
    assert_eq!(temp_files, 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn delete_during_in_flight_put() {
    init_tracing();
    let dir = tempdir().unwrap();
    let opts = opts_for("delete-in-flight", dir.path(), Duration::from_secs(3600));
    let handle = file_cache::start(opts, NamespaceSpec::Empty, NamespaceSpec::Empty)
        .await
        .unwrap();

    let op = OpOptions::new("delete-in-flight");
    let op_for_task = op.clone();

    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    let slow_producer = Producer::stream(futures::stream::once(async move {
        let _ = release_rx.await;
        Ok(Bytes::from_static(b"slow"))
    }));

    let put_task = tokio::spawn(async move {
        file_cache::put(slow_producer, "k", &op_for_task).await.unwrap()
    });

    // give the background put a moment to allocate its temp file
    tokio::time::sleep(Duration::from_millis(20)).await;

    file_cache::delete("k", &op).await.unwrap();
    assert!(file_cache::get("k", &op).await.unwrap().is_none());

    release_tx.send(()).unwrap();
    let stream = put_task.await.unwrap();
    assert_eq!(stream.read_to_vec().await.unwrap(), b"slow");

    let stream = file_cache::get("k", &op).await.unwrap().unwrap();
    assert_eq!(stream.read_to_vec().await.unwrap(), b"slow");

    handle.shutdown().await;
}

#[tokio::test]
async fn unknown_files_remove_policy_unlinks_foreign_files() {
    init_tracing();
    let dir = tempdir().unwrap();
    let mut opts = opts_for("unknown-files", dir.path(), Duration::from_secs(3600));
    opts.unknown_files = UnknownFiles::Remove;
    opts.verbose = true;
    let handle = file_cache::start(opts, NamespaceSpec::Empty, NamespaceSpec::Empty)
        .await
        .unwrap();

    let op = OpOptions::new("unknown-files");
    let cfg = file_cache::config(&op).unwrap();

    let bad_perm = cfg.dir.join("perm-file-cache$_$k");
    let bad_temp = cfg.temp_dir.join("temp-file-cache$$x$k");
    std::fs::write(&bad_perm, b"").unwrap();
    std::fs::write(&bad_temp, b"").unwrap();

    // let both cleaners' next tick observe the foreign files
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!bad_perm.exists());
    assert!(!bad_temp.exists());

    handle.shutdown().await;
}

#[tokio::test]
async fn namespace_spec_composes_path_segments() {
    use std::sync::Arc;

    init_tracing();
    let dir = tempdir().unwrap();
    let opts = opts_for("namespaced", dir.path(), Duration::from_secs(3600));

    let namespace = NamespaceSpec::seq([
        NamespaceSpec::Host,
        NamespaceSpec::literal("a"),
        NamespaceSpec::Fn(Arc::new(|| Ok("b".to_owned()))),
        NamespaceSpec::Call {
            module: "M".into(),
            function: "F".into(),
            args: vec!["c".into()],
            invoke: Arc::new(|args| Ok(args[0].clone())),
        },
    ]);

    let handle = file_cache::start(opts, namespace, NamespaceSpec::Empty)
        .await
        .unwrap();

    let op = OpOptions::new("namespaced");
    file_cache::put("x".to_owned(), "k", &op).await.unwrap();

    let cfg = file_cache::config(&op).unwrap();
    let hostname = gethostname::gethostname().into_string().unwrap();
    assert!(cfg
        .dir
        .ends_with(format!("{hostname}/a/b/c/namespaced")));

    handle.shutdown().await;
}
