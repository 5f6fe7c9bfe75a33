//! Length and liveness bounds on byte streams.

use crate::error::{stalled_io, truncated_io};
use crate::ByteStream;
use async_stream::stream;
use futures::StreamExt;
use std::time::Duration;

impl ByteStream {
    /// Yield exactly `limit` bytes, then stop pulling from the upstream.
    ///
    /// An upstream EOF before `limit` bytes surfaces as an in-band
    /// `UnexpectedEof` error. Excess upstream bytes past the limit are never
    /// requested; a chunk straddling the boundary is split.
    pub fn take_exact(self, limit: u64) -> ByteStream {
        let name = self.name.clone();
        let mut inner = self.inner;
        let wrapped = stream! {
            let mut remaining = limit;
            while remaining > 0 {
                match inner.next().await {
                    None => {
                        yield Err(truncated_io(limit, limit - remaining));
                        return;
                    },
                    Some(Err(err)) => {
                        yield Err(err);
                        return;
                    },
                    Some(Ok(mut chunk)) => {
                        if chunk.len() as u64 > remaining {
                            chunk.truncate(remaining as usize);
                        }
                        remaining -= chunk.len() as u64;
                        yield Ok(chunk);
                    },
                }
            }
        };
        let mut stream = ByteStream::new(wrapped, Some(limit));
        stream.name = name;
        stream
    }

    /// Abort the stream if no chunk arrives within `window`.
    ///
    /// The clock restarts on every chunk, so the bound is on inactivity, not
    /// total transfer time. Used by the copy/move engine to keep slow but
    /// live cross-provider transfers running indefinitely while still
    /// killing dead ones.
    pub fn stalled_after(self, window: Duration) -> ByteStream {
        let (size, name) = (self.size, self.name.clone());
        let mut inner = self.inner;
        let wrapped = stream! {
            loop {
                match tokio::time::timeout(window, inner.next()).await {
                    Err(_elapsed) => {
                        yield Err(stalled_io(window.as_secs()));
                        return;
                    },
                    Ok(None) => return,
                    Ok(Some(chunk)) => yield chunk,
                }
            }
        };
        let mut stream = ByteStream::new(wrapped, size);
        stream.name = name;
        stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_take_exact_passes_exact_length() {
        let stream = ByteStream::from_bytes(&b"hello"[..]).take_exact(5);
        assert_eq!(stream.size(), Some(5));
        assert_eq!(stream.collect().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_take_exact_splits_straddling_chunk() {
        let stream = ByteStream::from_bytes(&b"hello world"[..]).take_exact(5);
        assert_eq!(stream.collect().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_take_exact_fails_on_short_upstream() {
        let err = ByteStream::from_bytes(&b"hel"[..]).take_exact(5).collect().await.unwrap_err();
        assert!(err.to_string().contains("expected 5 bytes, got 3"), "got: {err}");
    }

    #[tokio::test]
    async fn test_stalled_after_passes_live_stream() {
        let stream = ByteStream::from_bytes(&b"quick"[..]).stalled_after(Duration::from_secs(5));
        assert_eq!(stream.collect().await.unwrap(), b"quick");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_after_aborts_dead_stream() {
        let never = futures::stream::once(async {
            futures::future::pending::<()>().await;
            Ok(Bytes::new())
        });
        let stream = ByteStream::new(never, None).stalled_after(Duration::from_secs(1));
        let err = stream.collect().await.unwrap_err();
        assert!(err.to_string().contains("stalled"), "got: {err}");
    }
}
