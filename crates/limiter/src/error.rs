//! Limiter error types.

use derive_more::{Display, Error};

/// A limiter error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for limiter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures talking to the shared counter store. With limiting enabled,
/// every one of these means the request must be refused (503) rather than
/// silently waved through.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Opening or talking to the store's database failed
    #[display("rate-limit store unavailable")]
    Database,
    /// Applying the store schema failed
    #[display("rate-limit store migration failed")]
    Migration,
}
