//! Built-in leaf backends.
//!
//! Remote-API adapters (object stores, code hosts, cloud drives) live
//! outside this workspace and implement [`StorageProvider`] the same way
//! these two do.
//!
//! [`StorageProvider`]: crate::StorageProvider

mod filesystem;
mod memory;

pub use self::filesystem::FilesystemProvider;
pub use self::memory::{MemoryProvider, MemoryTree};
