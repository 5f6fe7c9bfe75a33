//! Storage provider abstraction for the sluice gateway.
//!
//! This crate defines the pieces every backend shares: the validated
//! [`EntryPath`] model, the [`Metadata`] schema, the [`StorageProvider`]
//! contract with its default implementations, the gateway-wide error
//! taxonomy, and two built-in leaf backends (filesystem and memory).

pub mod backend;
pub mod error;
mod metadata;
mod path;
mod provider;

pub use crate::metadata::{Extra, FileMetadata, FolderMetadata, Metadata, RevisionMetadata};
pub use crate::path::{EntryPath, PathPart};
pub use crate::provider::{zip_folder, ByteRange, Download, ProviderHandle, StorageProvider};
