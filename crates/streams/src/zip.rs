//! Single-pass ZIP archiving of a sequence of byte streams.

use crate::ByteStream;
use async_stream::stream;
use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use futures::io::AsyncWriteExt;
use futures::{Future, StreamExt};
use std::io::Error as IoError;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::io::DuplexStream;
use tokio_util::io::ReaderStream;

// The write side blocks once this much is unread, which is what gives the
// archive its backpressure.
const ARCHIVE_BUFFER: usize = 64 * 1024;

type DeferredOpen = Pin<Box<dyn Future<Output = std::io::Result<ByteStream>> + Send + 'static>>;

/// One file in a [`zip_stream`] archive.
///
/// The source stream is opened lazily, only once the archiver reaches the
/// entry, so a thousand-file folder does not hold a thousand open downloads.
pub struct ZipEntry {
    name: String,
    open: DeferredOpen,
}

impl ZipEntry {
    /// Create an entry with a posix-style relative name (no leading slash)
    /// and a deferred stream constructor.
    pub fn new(
        name: impl Into<String>,
        open: impl Future<Output = std::io::Result<ByteStream>> + Send + 'static,
    ) -> Self {
        Self { name: name.into(), open: Box::pin(open) }
    }

    /// The entry's archive-relative name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Produce a ZIP archive of the given entries as a single-pass,
/// size-unknown byte stream.
///
/// Entries are written in the order given; the provider contract sorts them
/// lexically before calling. The archive is assembled by a background task
/// writing into a bounded duplex pipe, so bytes are only produced as fast as
/// the consumer reads them. An entry failure surfaces as an in-band stream
/// error after the bytes written so far.
pub fn zip_stream(entries: Vec<ZipEntry>) -> ByteStream {
    let (read_half, write_half) = tokio::io::duplex(ARCHIVE_BUFFER);
    let failure: Arc<Mutex<Option<IoError>>> = Arc::new(Mutex::new(None));
    let task_failure = Arc::clone(&failure);
    tokio::spawn(async move {
        if let Err(err) = write_archive(write_half, entries).await {
            tracing::warn!(error = %err, "zip archive assembly failed");
            *task_failure.lock().expect("archive failure slot poisoned") = Some(err);
        }
        // Dropping the write half EOFs the read side.
    });

    let mut reader = ReaderStream::with_capacity(read_half, ARCHIVE_BUFFER);
    ByteStream::new(
        stream! {
            while let Some(chunk) = reader.next().await {
                yield chunk;
            }
            let failed = failure.lock().expect("archive failure slot poisoned").take();
            if let Some(err) = failed {
                yield Err(err);
            }
        },
        None,
    )
}

async fn write_archive(writer: DuplexStream, entries: Vec<ZipEntry>) -> std::io::Result<()> {
    let mut archive = ZipFileWriter::with_tokio(writer);
    for entry in entries {
        let mut source = entry.open.await?;
        let builder = ZipEntryBuilder::new(entry.name.into(), Compression::Deflate);
        let mut sink = archive.write_entry_stream(builder).await.map_err(IoError::other)?;
        while let Some(chunk) = source.next().await {
            sink.write_all(&chunk?).await?;
        }
        sink.close().await.map_err(IoError::other)?;
    }
    archive.close().await.map_err(IoError::other)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|window| window == needle)
    }

    #[tokio::test]
    async fn test_zip_stream_produces_archive() {
        let entries = vec![
            ZipEntry::new("a.txt", async { Ok(ByteStream::from_bytes(&b"x"[..])) }),
            ZipEntry::new("sub/b.txt", async { Ok(ByteStream::from_bytes(&b"y"[..])) }),
        ];
        let stream = zip_stream(entries);
        assert_eq!(stream.size(), None, "archives are size-unknown");
        let archive = stream.collect().await.unwrap();

        // Local file header magic, both entry names, and the end-of-central-
        // directory record.
        assert!(archive.starts_with(b"PK\x03\x04"));
        assert!(contains(&archive, b"a.txt"));
        assert!(contains(&archive, b"sub/b.txt"));
        assert!(contains(&archive, b"PK\x05\x06"));
    }

    #[tokio::test]
    async fn test_zip_stream_empty_archive() {
        let archive = zip_stream(vec![]).collect().await.unwrap();
        // Just the end-of-central-directory record.
        assert!(contains(&archive, b"PK\x05\x06"));
    }

    #[tokio::test]
    async fn test_zip_stream_surfaces_entry_failure() {
        let entries = vec![ZipEntry::new("gone.txt", async {
            Err(IoError::new(std::io::ErrorKind::NotFound, "source disappeared"))
        })];
        let err = zip_stream(entries).collect().await.unwrap_err();
        assert!(err.to_string().contains("source disappeared"), "got: {err}");
    }
}
