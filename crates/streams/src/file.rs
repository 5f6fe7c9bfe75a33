//! File-backed streams and temporary spooling.

use crate::error::{ErrorKind, Result};
use crate::ByteStream;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

const READ_BUFFER: usize = 64 * 1024;

impl ByteStream {
    /// Stream an open file from its current position.
    ///
    /// `size` should be the number of bytes remaining; pass `None` when it
    /// is genuinely unknown (e.g. a file being appended to concurrently is
    /// not supported — callers stat first).
    pub fn from_file(file: File, size: Option<u64>) -> ByteStream {
        ByteStream::new(ReaderStream::with_capacity(file, READ_BUFFER), size)
    }

    /// Drain a size-unknown stream into an unlinked temporary file and
    /// return a restartable stream of known size.
    ///
    /// This is the explicit buffering escape hatch for destinations that
    /// demand a declared length from a source that cannot provide one. The
    /// temp file is anonymous and disappears when the returned stream is
    /// dropped.
    pub async fn spool_to_temp(mut self) -> Result<ByteStream> {
        let name = self.name.clone();
        let spool = tempfile::tempfile().map_err(ErrorKind::Io)?;
        let mut spool = File::from_std(spool);
        let mut written: u64 = 0;
        while let Some(chunk) = self.inner.next().await {
            let chunk = chunk.map_err(ErrorKind::Io)?;
            spool.write_all(&chunk).await.map_err(ErrorKind::Io)?;
            written += chunk.len() as u64;
        }
        spool.flush().await.map_err(ErrorKind::Io)?;
        spool.seek(std::io::SeekFrom::Start(0)).await.map_err(ErrorKind::Io)?;
        let mut stream = ByteStream::from_file(spool, Some(written));
        stream.name = name;
        Ok(stream)
    }
}
