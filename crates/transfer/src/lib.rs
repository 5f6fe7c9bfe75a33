//! The copy/move engine.
//!
//! Moves and copies files and folder trees between two per-request provider
//! instances: the same mount (a degenerate no-op), the same backing store (a
//! native server-side operation), or two unrelated stores (a hash-verified
//! byte stream through the gateway). Name conflicts at the destination are
//! resolved up front according to a [`ConflictPolicy`]; folder recursion
//! resolves them at the top only.
//!
//! Errors are the storage taxonomy from
//! [`sluice_provider::error`] — the engine adds no wrapper kinds, so the
//! HTTP layer maps engine failures exactly like provider failures.

mod engine;
mod naming;

pub use crate::engine::{transfer, TransferKind, TransferOptions, TransferOutcome};
pub use crate::naming::ConflictPolicy;
