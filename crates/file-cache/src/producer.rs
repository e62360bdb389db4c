//! The small sum type replacing duck-typed producer acceptance: bytes, a
//! chunk list, a lazy stream, or a thunk resolving to any of those.

use bytes::Bytes;
use file_cache_core::error::ProducerError;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};

pub type ProducerResult<T> = Result<T, ProducerError>;
pub type ByteStream = BoxStream<'static, ProducerResult<Bytes>>;

/// `Bytes | ChunkIter | Thunk<Self>`, resolved once: a [`Producer::Thunk`]
/// is invoked exactly one time and its result (which may itself be any
/// producer shape, including another thunk) is then resolved in turn.
pub enum Producer {
    /// Raw bytes.
    Bytes(Bytes),
    /// A sequence of byte chunks, concatenated.
    Chunks(Vec<Bytes>),
    /// A lazy stream of byte chunks.
    Stream(ByteStream),
    /// A zero-argument function returning any producer shape.
    Thunk(Box<dyn FnOnce() -> BoxFuture<'static, ProducerResult<Producer>> + Send>),
}

impl Producer {
    pub fn bytes(b: impl Into<Bytes>) -> Self {
        Producer::Bytes(b.into())
    }

    pub fn chunks(chunks: Vec<Bytes>) -> Self {
        Producer::Chunks(chunks)
    }

    pub fn stream<S>(s: S) -> Self
    where
        S: futures::Stream<Item = ProducerResult<Bytes>> + Send + 'static,
    {
        Producer::Stream(Box::pin(s))
    }

    pub fn thunk<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ProducerResult<Producer>> + Send + 'static,
    {
        Producer::Thunk(Box::new(move || Box::pin(f())))
    }

    /// Flattens this producer into a single byte stream, resolving at most
    /// one level of thunk indirection per call (a thunk returning another
    /// thunk is resolved again, but each resolution only happens once).
    pub fn into_stream(self) -> BoxFuture<'static, ProducerResult<ByteStream>> {
        Box::pin(async move {
            match self {
                Producer::Bytes(b) => {
                    Ok(Box::pin(stream::once(async move { Ok(b) })) as ByteStream)
                }
                Producer::Chunks(chunks) => {
                    Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))) as ByteStream)
                }
                Producer::Stream(s) => Ok(s),
                Producer::Thunk(f) => {
                    let inner = f().await?;
                    inner.into_stream().await
                }
            }
        })
    }
}

impl From<Vec<u8>> for Producer {
    fn from(v: Vec<u8>) -> Self {
        Producer::Bytes(Bytes::from(v))
    }
}

impl From<Bytes> for Producer {
    fn from(b: Bytes) -> Self {
        Producer::Bytes(b)
    }
}

impl From<String> for Producer {
    fn from(s: String) -> Self {
        Producer::Bytes(Bytes::from(s.into_bytes()))
    }
}

impl From<&'static str> for Producer {
    fn from(s: &'static str) -> Self {
        Producer::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl From<Vec<Bytes>> for Producer {
    fn from(chunks: Vec<Bytes>) -> Self {
        Producer::Chunks(chunks)
    }
}
