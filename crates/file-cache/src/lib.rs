//! A filesystem-backed, TTL-indexed, multi-tenant content cache.
//!
//! Start a named cache with [`start`], then `put`/`execute`/`get` artifacts
//! keyed by an opaque string id. Each artifact is stored as a regular file
//! with its expiration encoded into the filename — there is no in-process
//! index to go stale or corrupt. Two background cleaners reclaim expired
//! permanent files and orphaned temp files; neither ever blocks a caller.
//!
//! ```no_run
//! use std::time::Duration;
//! use file_cache::{CacheOptions, NamespaceSpec, OpOptions, UnknownFiles};
//!
//! # async fn run() -> Result<(), file_cache::CacheError> {
//! let opts = CacheOptions {
//!     cache: "objects".into(),
//!     dir: "/var/cache/objects".into(),
//!     temp_dir: "/var/cache/objects-tmp".into(),
//!     ttl: Duration::from_secs(3600),
//!     stale_clean_interval: Duration::from_secs(60),
//!     temp_clean_interval: Duration::from_secs(60),
//!     unknown_files: UnknownFiles::Keep,
//!     verbose: false,
//! };
//! let _handle = file_cache::start(opts, NamespaceSpec::Empty, NamespaceSpec::Empty).await?;
//!
//! let op = OpOptions::new("objects");
//! file_cache::put("hello".to_owned(), "greeting", &op).await?;
//! let stream = file_cache::get("greeting", &op).await?.unwrap();
//! assert_eq!(stream.read_to_vec().await.unwrap(), b"hello");
//! # Ok(())
//! # }
//! ```

mod pipeline;
mod producer;
mod stream;
mod supervisor;

pub use file_cache_core::config::{CacheConfig, CacheOptions, ConfigValue, UnknownFiles};
pub use file_cache_core::error::CacheError;
pub use file_cache_core::namespace::NamespaceSpec;

pub use pipeline::{clean, config, delete, exists, get, get_record, put, stats};
pub use pipeline::{execute, CacheRecord, OpOptions, Stats};
pub use producer::{ByteStream, Producer, ProducerResult};
pub use stream::ReadStream;
pub use supervisor::{start, CacheHandle};
