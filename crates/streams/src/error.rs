//! Stream error types.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A stream error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for stream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure categories for stream assembly and consumption.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Underlying I/O error while reading or spooling
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Upstream ended before producing the declared number of bytes
    #[display("stream truncated: expected {expected} bytes, got {received}")]
    Truncated {
        #[error(not(source))]
        expected: u64,
        #[error(not(source))]
        received: u64,
    },
    /// No bytes arrived within the inactivity window
    #[display("stream stalled: no data for {_0} seconds")]
    Stalled(#[error(not(source))] u64),
    /// Zip archive assembly failed
    #[display("archive error: {_0}")]
    Archive(#[error(not(source))] String),
}

impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

/// Chunk-level errors travel inside the stream as `std::io::Error` so that
/// consumers (HTTP bodies, `tokio::io::copy`, archive writers) can take the
/// stream without knowing about this crate's error type. These helpers build
/// the two in-band failures the wrappers emit.
pub(crate) fn truncated_io(expected: u64, received: u64) -> IoError {
    IoError::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("stream truncated: expected {expected} bytes, got {received}"),
    )
}

pub(crate) fn stalled_io(seconds: u64) -> IoError {
    IoError::new(std::io::ErrorKind::TimedOut, format!("stream stalled: no data for {seconds} seconds"))
}
