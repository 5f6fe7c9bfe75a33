//! The gateway-wide storage error taxonomy.
//!
//! Every backend normalises its failures into these kinds; nothing above
//! the provider layer ever sees a raw backend status code. The copy/move
//! engine shares this taxonomy rather than wrapping it, so the HTTP layer
//! can map any storage-side failure to a status with one `match`.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories, each with a fixed HTTP status.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Malformed or kind-mismatched raw path
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// A request parameter is missing or malformed
    #[display("invalid argument: {_0}")]
    InvalidArgument(#[error(not(source))] String),
    /// Entity does not exist (or exists with the other kind)
    #[display("could not retrieve file or directory {_0}")]
    NotFound(#[error(not(source))] String),
    /// The provider cannot perform this operation at all
    #[display("{_0} is not supported by this provider")]
    NotSupported(#[error(not(source))] String),
    /// A file or folder already exists under the target name
    #[display("cannot complete action: \"{_0}\" already exists in this location")]
    NamingConflict(#[error(not(source))] String),
    /// Entity existed once but is permanently unavailable
    #[display("{_0} is gone")]
    Gone(#[error(not(source))] String),
    /// Request body exceeds the acceptable size
    #[display("payload too large: limit is {_0} bytes")]
    PayloadTooLarge(#[error(not(source))] u64),
    /// Fewer or more bytes arrived than the stream declared
    #[display("upload incomplete: expected {expected} bytes, received {received}")]
    UploadIncomplete {
        #[error(not(source))]
        expected: u64,
        #[error(not(source))]
        received: u64,
    },
    /// Source and destination digests disagree after a streamed copy
    #[display("{algorithm} mismatch after transfer: {source} != {destination}")]
    HashMismatch {
        #[error(not(source))]
        algorithm: String,
        #[error(not(source))]
        source: String,
        #[error(not(source))]
        destination: String,
    },
    /// The operation exists in the contract but this pairing lacks it
    #[display("{_0} is not implemented for this provider pairing")]
    NotImplemented(#[error(not(source))] String),
    /// The backend misbehaved in a way we can't classify
    #[display("provider error: {_0}")]
    Provider(#[error(not(source))] String),
    /// Underlying I/O failure
    #[display("I/O error: {_0}")]
    Io(IoError),
}

impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// The fixed HTTP status for this kind.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidPath(_) | Self::InvalidArgument(_) | Self::UploadIncomplete { .. } => 400,
            Self::NotFound(_) => 404,
            Self::NotSupported(_) => 405,
            Self::NamingConflict(_) => 409,
            Self::Gone(_) => 410,
            Self::PayloadTooLarge(_) => 413,
            Self::HashMismatch { .. } => 500,
            Self::NotImplemented(_) => 501,
            Self::Provider(_) => 502,
            Self::Io(_) => 500,
        }
    }

    /// The stable machine-readable code used in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) => "InvalidPath",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::NotFound(_) => "NotFound",
            Self::NotSupported(_) => "NotSupported",
            Self::NamingConflict(_) => "NamingConflict",
            Self::Gone(_) => "Gone",
            Self::PayloadTooLarge(_) => "PayloadTooLarge",
            Self::UploadIncomplete { .. } => "UploadIncomplete",
            Self::HashMismatch { .. } => "HashMismatch",
            Self::NotImplemented(_) => "NotImplemented",
            Self::Provider(_) => "ProviderError",
            Self::Io(_) => "Unexpected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::InvalidPath("x".into()), 400, "InvalidPath")]
    #[case(ErrorKind::NotFound("/a".into()), 404, "NotFound")]
    #[case(ErrorKind::NotSupported("create_folder".into()), 405, "NotSupported")]
    #[case(ErrorKind::NamingConflict("a.txt".into()), 409, "NamingConflict")]
    #[case(ErrorKind::PayloadTooLarge(1), 413, "PayloadTooLarge")]
    #[case(ErrorKind::UploadIncomplete { expected: 2, received: 1 }, 400, "UploadIncomplete")]
    #[case(ErrorKind::NotImplemented("intra_copy".into()), 501, "NotImplemented")]
    #[case(ErrorKind::Provider("boom".into()), 502, "ProviderError")]
    fn test_status_and_code(#[case] kind: ErrorKind, #[case] status: u16, #[case] code: &str) {
        assert_eq!(kind.status(), status);
        assert_eq!(kind.code(), code);
    }
}
