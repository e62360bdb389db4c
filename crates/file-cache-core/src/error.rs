use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the filename encoder when a basename does not belong
/// to this cache's naming scheme, or belongs to it but is corrupt.
///
/// Parse errors are never propagated to callers: the stores catch them
/// and hand the offending path to the `unknown_files` policy instead.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    #[error("basename does not split into the expected number of `{sep}`-separated parts")]
    BadFormat { sep: char },
    #[error("basename does not start with the expected prefix")]
    BadPrefix,
    #[error("`expires_at` segment is not a valid timestamp")]
    BadTimestamp,
    #[error("owner segment is not a token this process recognizes")]
    BadOwner,
}

/// One variant per error kind a cache operation can surface.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("unknown cache `{0}`")]
    UnknownCache(String),

    #[error("unknown config key `{key}` for cache `{cache}`")]
    UnknownConfigKey { cache: String, key: String },

    #[error("invalid namespace part: {0:?}")]
    BadNamespacePart(String),

    #[error("invalid cache name `{0}`: must be a non-empty ASCII segment without `/`")]
    BadCacheName(String),

    #[error("invalid id `{0}`: ids must be non-empty and must not contain `/`")]
    BadId(String),

    #[error("producer did not yield a recognized byte source")]
    BadProducer,

    #[error("rename of {from} to {to} failed: {source}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Producer(#[from] ProducerError),
}

impl CacheError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Wraps whatever error a producer callback raised, so it can cross the
/// pipeline boundary without the pipeline knowing the producer's own error
/// type. The cache still unlinks its temp file before this propagates.
#[derive(Debug, Error)]
#[error("producer failed: {0}")]
pub struct ProducerError(#[source] pub Box<dyn std::error::Error + Send + Sync + 'static>);

pub type Result<T> = std::result::Result<T, CacheError>;
