//! Auth error types.

use derive_more::{Display, Error};

/// An auth error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why an auth handler refused to hand out a credentials bundle.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The caller's tokens are missing or invalid
    #[display("unauthorized: {_0}")]
    Unauthorized(#[error(not(source))] String),
    /// Valid tokens, but no permission for this action
    #[display("forbidden: {_0}")]
    Forbidden(#[error(not(source))] String),
    /// The resource (or its provider mount) does not exist
    #[display("resource not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The auth authority itself failed
    #[display("auth provider unavailable: {_0}")]
    Upstream(#[error(not(source))] String),
}

impl ErrorKind {
    /// The fixed HTTP status for this kind.
    pub fn status(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Upstream(_) => 503,
        }
    }

    /// The stable machine-readable code used in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::NotFound(_) => "NotFound",
            Self::Upstream(_) => "ServiceUnavailable",
        }
    }
}
