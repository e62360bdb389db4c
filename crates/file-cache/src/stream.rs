//! The lazily-opened read stream returned by `put`/`execute`/`get`.
//!
//! Opening the file is deferred until the first poll so that a stale
//! sweep racing between `get` and the caller's first read is observable:
//! the caller sees an empty/error stream rather than bytes that have
//! already been unlinked from under them.

use std::fs::Metadata;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::Stream;
use tokio_util::io::ReaderStream;

enum State {
    Unopened,
    Opening(BoxFuture<'static, io::Result<tokio::fs::File>>),
    Reading(ReaderStream<tokio::fs::File>),
    Done,
}

/// An iterator of byte chunks over a permanent cache file, opened lazily.
pub struct ReadStream {
    path: PathBuf,
    state: State,
}

impl ReadStream {
    pub fn new(path: PathBuf) -> Self {
        ReadStream {
            path,
            state: State::Unopened,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Reads the whole stream into memory. Convenience for callers (and
    /// tests) that don't need backpressure.
    pub async fn read_to_vec(mut self) -> io::Result<Vec<u8>> {
        use futures::StreamExt;
        let mut out = Vec::new();
        while let Some(chunk) = self.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    pub async fn metadata(&self) -> io::Result<Metadata> {
        tokio::fs::metadata(&self.path).await
    }
}

impl Stream for ReadStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                State::Unopened => {
                    let path = this.path.clone();
                    this.state = State::Opening(Box::pin(tokio::fs::File::open(path)));
                }
                State::Opening(fut) => match fut.as_mut().poll(cx) {
                    Poll::Ready(Ok(file)) => {
                        this.state = State::Reading(ReaderStream::new(file));
                    }
                    Poll::Ready(Err(e)) => {
                        this.state = State::Done;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                State::Reading(reader) => {
                    return match Pin::new(reader).poll_next(cx) {
                        Poll::Ready(None) => {
                            this.state = State::Done;
                            Poll::Ready(None)
                        }
                        other => other,
                    };
                }
                State::Done => return Poll::Ready(None),
            }
        }
    }
}
