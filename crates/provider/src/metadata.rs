//! Metadata returned by storage providers.
//!
//! A fixed schema with an `extra` map for provider-specific fields; callers
//! never get ad-hoc attribute access. Folder paths always end with a slash,
//! file paths never do, and `Metadata::path()` round-trips with the
//! [`EntryPath`](crate::EntryPath) that produced it.

use std::collections::BTreeMap;
use time::OffsetDateTime;

pub type Extra = serde_json::Map<String, serde_json::Value>;

/// Metadata for a single file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    /// Display name of the file (the last path segment).
    pub name: String,
    /// Materialized path, leading slash, no trailing slash.
    pub path: String,
    /// Name of the producing provider.
    pub provider: String,
    /// Size in bytes, when the backend reports one.
    pub size: Option<u64>,
    /// MIME type, when known.
    pub content_type: Option<String>,
    /// Last-modified timestamp, when the backend reports one.
    pub modified: Option<OffsetDateTime>,
    /// Creation timestamp, when the backend reports one.
    pub created: Option<OffsetDateTime>,
    /// Opaque entity tag.
    pub etag: Option<String>,
    /// Content hashes keyed by lowercase algorithm name, hex digests.
    pub hashes: BTreeMap<String, String>,
    /// Provider-specific fields.
    pub extra: Extra,
}

impl FileMetadata {
    pub fn new(name: impl Into<String>, path: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            provider: provider.into(),
            size: None,
            content_type: None,
            modified: None,
            created: None,
            etag: None,
            hashes: BTreeMap::new(),
            extra: Extra::new(),
        }
    }
}

/// Metadata for a folder. Children are listed separately (see
/// [`StorageProvider::children`](crate::StorageProvider::children)) except
/// when a copy/move engine attaches the immediate children of a freshly
/// transferred folder.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FolderMetadata {
    /// Display name of the folder; empty for the root.
    pub name: String,
    /// Materialized path, leading and trailing slash.
    pub path: String,
    /// Name of the producing provider.
    pub provider: String,
    /// Provider-specific fields.
    pub extra: Extra,
    /// Immediate children, populated only by folder transfers.
    pub children: Option<Vec<Metadata>>,
}

impl FolderMetadata {
    pub fn new(name: impl Into<String>, path: impl Into<String>, provider: impl Into<String>) -> Self {
        Self { name: name.into(), path: path.into(), provider: provider.into(), extra: Extra::new(), children: None }
    }
}

/// A tagged file-or-folder metadata variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Metadata {
    File(FileMetadata),
    Folder(FolderMetadata),
}

impl Metadata {
    pub fn name(&self) -> &str {
        match self {
            Self::File(file) => &file.name,
            Self::Folder(folder) => &folder.name,
        }
    }

    /// The materialized path string (trailing slash for folders).
    pub fn path(&self) -> &str {
        match self {
            Self::File(file) => &file.path,
            Self::Folder(folder) => &folder.path,
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            Self::File(file) => &file.provider,
            Self::Folder(folder) => &folder.provider,
        }
    }

    /// `"file"` or `"folder"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Folder(_) => "folder",
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    pub fn etag(&self) -> Option<&str> {
        match self {
            Self::File(file) => file.etag.as_deref(),
            Self::Folder(_) => None,
        }
    }

    pub fn extra(&self) -> &Extra {
        match self {
            Self::File(file) => &file.extra,
            Self::Folder(folder) => &folder.extra,
        }
    }
}

impl From<FileMetadata> for Metadata {
    fn from(file: FileMetadata) -> Self {
        Self::File(file)
    }
}

impl From<FolderMetadata> for Metadata {
    fn from(folder: FolderMetadata) -> Self {
        Self::Folder(folder)
    }
}

/// Metadata for one revision of a file, newest first in listings.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionMetadata {
    /// Provider-assigned version identifier.
    pub version: String,
    /// When this revision was written.
    pub modified: Option<OffsetDateTime>,
    /// Who wrote it, when the backend tracks authorship.
    pub author: Option<String>,
    /// Provider-specific fields.
    pub extra: Extra,
}

impl RevisionMetadata {
    pub fn new(version: impl Into<String>) -> Self {
        Self { version: version.into(), modified: None, author: None, extra: Extra::new() }
    }
}
