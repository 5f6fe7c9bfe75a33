//! Pull-based byte streams for the sluice gateway.
//!
//! Every byte that passes through the gateway travels as a [`ByteStream`]: a
//! boxed [`futures::Stream`] of [`Bytes`] chunks with a declared (possibly
//! unknown) size and an optional suggested filename. On top of the plain
//! stream this crate provides the wrappers the request pipeline and the
//! copy/move engine compose:
//!
//! - [`ByteStream::observe`] — tee chunks through one or more running
//!   digests ([`HashAlgorithm`]), exposing the hex digests once the stream
//!   is exhausted
//! - [`ByteStream::take_exact`] — cap consumption at N bytes, failing if
//!   the upstream ends early
//! - [`ByteStream::stalled_after`] — abort when no chunk arrives within an
//!   inactivity window
//! - [`spool_to_temp`](ByteStream::spool_to_temp) — drain a size-unknown
//!   stream into a temporary file and get back a restartable, size-known one
//! - [`zip_stream`] — a single-pass, non-seekable ZIP archive pulled from
//!   deferred per-entry streams
//!
//! All wrappers pull lazily; nothing buffers more than one chunk (the spool
//! is the explicit exception, and it buffers to disk, not memory).

pub mod error;
mod file;
mod hash;
mod limit;
mod zip;

pub use crate::hash::{DigestObserver, HashAlgorithm};
pub use crate::zip::{ZipEntry, zip_stream};

use crate::error::{ErrorKind, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io::Error as IoError;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The item type carried by a [`ByteStream`].
///
/// In-band errors are `std::io::Error` so the stream can feed HTTP response
/// bodies and `tokio::io` adapters without conversion.
pub type Chunk = std::result::Result<Bytes, IoError>;

type Inner = Pin<Box<dyn Stream<Item = Chunk> + Send + 'static>>;

/// An asynchronous byte source with a declared size.
///
/// Single-pass unless explicitly rebuilt (see
/// [`spool_to_temp`](Self::spool_to_temp)). `size` is a declaration, not a
/// guarantee; consumers that care (uploads) must verify the received byte
/// count themselves or wrap with [`take_exact`](Self::take_exact).
pub struct ByteStream {
    inner: Inner,
    size: Option<u64>,
    name: Option<String>,
}

impl ByteStream {
    /// Wrap an arbitrary chunk stream with a declared size.
    pub fn new(stream: impl Stream<Item = Chunk> + Send + 'static, size: Option<u64>) -> Self {
        Self { inner: Box::pin(stream), size, name: None }
    }

    /// A stream over an in-memory buffer. Size is always known.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self::new(futures::stream::once(async move { Ok(data) }), Some(size))
    }

    /// The empty stream (size zero).
    pub fn empty() -> Self {
        Self::new(futures::stream::empty(), Some(0))
    }

    /// Declared size in bytes, if known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Suggested filename, if the producer knows one (e.g. a versioned
    /// download whose stored name differs from the requested path).
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Attach a suggested filename.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Drain the stream into memory.
    ///
    /// Only for small payloads (tests, JSON bodies, the memory backend);
    /// the pipeline itself never collects user file content.
    pub async fn collect(mut self) -> Result<Vec<u8>> {
        let mut buf = match self.size {
            Some(size) => Vec::with_capacity(usize::try_from(size).unwrap_or(0)),
            None => Vec::new(),
        };
        while let Some(chunk) = self.inner.next().await {
            buf.extend_from_slice(&chunk.map_err(ErrorKind::Io)?);
        }
        Ok(buf)
    }
}

impl Stream for ByteStream {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream").field("size", &self.size).field("name", &self.name).finish_non_exhaustive()
    }
}
