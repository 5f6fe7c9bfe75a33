//! The provider contract every storage backend implements.
//!
//! Required methods cover what only the backend can know (existence,
//! listing, bytes in, bytes out); everything that can be expressed in terms
//! of other operations — existence probes, v1 path validation, zip
//! archiving, intra-provider move — has a default here so leaf adapters stay
//! small. Instances are per-request values constructed from an auth bundle;
//! they hold no cross-request state beyond their backing store handle.

use crate::error::{ErrorKind, Result};
use crate::metadata::{FileMetadata, FolderMetadata, Metadata, RevisionMetadata};
use crate::path::EntryPath;
use async_trait::async_trait;
use sluice_streams::{zip_stream, ByteStream, ZipEntry};
use std::sync::Arc;

/// A per-request provider instance, shared with the streams it produces.
pub type ProviderHandle = Arc<dyn StorageProvider>;

/// An inclusive byte range for partial downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// Inclusive end offset; `None` means "to the end of the file".
    pub end: Option<u64>,
}

/// What a download produced: bytes to proxy, or a signed URL to redirect to.
///
/// Providers may only return [`Redirect`](Self::Redirect) when the caller
/// passed `accept_redirect = true`.
pub enum Download {
    Stream(ByteStream),
    Redirect(String),
}

impl Download {
    /// Unwrap the streaming variant; a redirect here is a provider bug
    /// because the caller asked for bytes.
    pub fn into_stream(self) -> Result<ByteStream> {
        match self {
            Self::Stream(stream) => Ok(stream),
            Self::Redirect(_) => {
                exn::bail!(ErrorKind::Provider("provider returned a redirect for a direct download".to_string()))
            },
        }
    }
}

#[async_trait]
pub trait StorageProvider: Send + Sync + std::fmt::Debug {
    /// The provider kind name (`"filesystem"`, `"memory"`, ...), as it
    /// appears in URLs and metadata.
    fn name(&self) -> &'static str;

    /// An opaque identifier for the backing store this instance points at.
    /// Two instances index the same bytes iff their storage root ids (and
    /// names) are equal.
    fn storage_root_id(&self) -> String;

    /// Whether a file and a folder in the same directory can share a name.
    /// Conflict resolution probes the opposite kind too when this is false.
    fn can_duplicate_names(&self) -> bool {
        true
    }

    /// Whether [`upload`](Self::upload) refuses size-unknown streams. The
    /// copy/move engine spools such sources to a temp file first.
    fn requires_known_length(&self) -> bool {
        false
    }

    /// Parse and normalise a raw path without requiring that it exists.
    /// Used for the destinations of uploads, folder creation and transfers.
    async fn validate_path(&self, raw: &str) -> Result<EntryPath>;

    /// Metadata for the entity at `path`, optionally of a specific version.
    async fn metadata(&self, path: &EntryPath, version: Option<&str>) -> Result<Metadata>;

    /// The immediate children of a folder, in the provider's natural order.
    /// Callers must not assume the order is alphabetical.
    async fn children(&self, path: &EntryPath) -> Result<Vec<Metadata>>;

    /// Download a file's bytes, or a signed URL when the backend supports
    /// them and the caller set `accept_redirect`.
    async fn download(
        &self,
        path: &EntryPath,
        version: Option<&str>,
        range: Option<ByteRange>,
        accept_redirect: bool,
    ) -> Result<Download>;

    /// Store a file's bytes. Returns the resulting metadata (with at least
    /// one content hash computed on the wire) and whether a new entity was
    /// created (`false` when an existing one was replaced).
    ///
    /// If the stream declares a size and a different number of bytes
    /// arrives, the upload fails with
    /// [`UploadIncomplete`](ErrorKind::UploadIncomplete). Name conflicts are
    /// resolved by the caller before this is invoked.
    async fn upload(&self, stream: ByteStream, path: &EntryPath) -> Result<(FileMetadata, bool)>;

    /// Delete the entity at `path`. Deleting the root requires
    /// `confirm_delete` and clears all children while leaving the root
    /// itself in place.
    async fn delete(&self, path: &EntryPath, confirm_delete: bool) -> Result<()>;

    /// Create a folder, returning its metadata.
    async fn create_folder(&self, _path: &EntryPath) -> Result<FolderMetadata> {
        exn::bail!(ErrorKind::NotSupported("folder creation".to_string()))
    }

    /// The revision history of a file, newest first.
    async fn revisions(&self, _path: &EntryPath) -> Result<Vec<RevisionMetadata>> {
        exn::bail!(ErrorKind::NotSupported("revisions".to_string()))
    }

    /// True iff a server-side copy to `other` is possible for `path`.
    fn can_intra_copy(&self, _other: &dyn StorageProvider, _path: &EntryPath) -> bool {
        false
    }

    /// True iff a server-side move to `other` is possible for `path`.
    fn can_intra_move(&self, _other: &dyn StorageProvider, _path: &EntryPath) -> bool {
        false
    }

    /// Native server-side copy. Only called when
    /// [`can_intra_copy`](Self::can_intra_copy) returned true.
    async fn intra_copy(
        &self,
        _dest: &dyn StorageProvider,
        _src_path: &EntryPath,
        _dest_path: &EntryPath,
    ) -> Result<(Metadata, bool)> {
        exn::bail!(ErrorKind::NotImplemented("intra_copy".to_string()))
    }

    /// Native server-side move: defaults to copy-then-delete-source.
    async fn intra_move(
        &self,
        dest: &dyn StorageProvider,
        src_path: &EntryPath,
        dest_path: &EntryPath,
    ) -> Result<(Metadata, bool)> {
        let (metadata, created) = self.intra_copy(dest, src_path, dest_path).await?;
        self.delete(src_path, false).await?;
        Ok((metadata, created))
    }

    /// Whether this instance and `other` index the same bytes. Used by the
    /// move engine to detect degenerate self-moves.
    fn shares_storage_root(&self, other: &dyn StorageProvider) -> bool {
        self.name() == other.name() && self.storage_root_id() == other.storage_root_id()
    }

    /// Parse a raw path and confirm both existence and kind: requests ending
    /// in a slash must name a folder, requests without one must name a file.
    /// A kind mismatch is a [`NotFound`](ErrorKind::NotFound), not an
    /// invalid path — the entity the URL describes genuinely does not exist.
    async fn validate_v1_path(&self, raw: &str) -> Result<EntryPath> {
        let path = self.validate_path(raw).await?;
        let metadata = self.metadata(&path, None).await?;
        if metadata.is_folder() != path.is_folder() {
            exn::bail!(ErrorKind::NotFound(raw.to_string()));
        }
        Ok(path)
    }

    /// Metadata if the entity exists, `None` if it does not.
    async fn exists(&self, path: &EntryPath) -> Result<Option<Metadata>> {
        match self.metadata(path, None).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(err) if matches!(&*err, ErrorKind::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Build the path of `base`'s child called `name`. Id-addressed
    /// providers override this to look up the child's identifier.
    async fn revalidate_path(&self, base: &EntryPath, name: &str, folder: bool) -> Result<EntryPath> {
        base.child(name, None, folder)
    }

    /// Reconstruct a path from metadata this provider produced.
    /// Id-addressed providers override this to restore part identifiers.
    fn path_from_metadata(&self, metadata: &Metadata) -> Result<EntryPath> {
        EntryPath::parse(metadata.path())
    }
}

/// Stream a ZIP archive of the folder at `path` (or of a single file).
///
/// The default expression of the provider contract's `zip` operation: walk
/// the tree with [`children`](StorageProvider::children), collect every
/// file, sort by archive-relative path, and hand deferred downloads to
/// [`zip_stream`]. Entry names are posix-relative to the requested folder.
pub async fn zip_folder(provider: &ProviderHandle, path: &EntryPath) -> Result<ByteStream> {
    let base = if path.is_file() { path.parent() } else { path.clone() };
    let base_prefix = base.materialized();

    let mut files = Vec::new();
    let mut remaining = vec![path.clone()];
    while let Some(current) = remaining.pop() {
        if current.is_file() {
            files.push(current);
            continue;
        }
        for item in provider.children(&current).await? {
            let child = provider.revalidate_path(&current, item.name(), item.is_folder()).await?;
            if child.is_file() {
                files.push(child);
            } else {
                remaining.push(child);
            }
        }
    }

    let mut entries: Vec<(String, EntryPath)> = files
        .into_iter()
        .map(|file| {
            let relative = file.materialized().strip_prefix(&base_prefix).unwrap_or_default().to_string();
            (relative, file)
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let entries = entries
        .into_iter()
        .map(|(name, file)| {
            let provider = Arc::clone(provider);
            ZipEntry::new(name, async move {
                match provider.download(&file, None, None, false).await {
                    Ok(Download::Stream(stream)) => Ok(stream),
                    Ok(Download::Redirect(_)) => {
                        Err(std::io::Error::other("provider returned a redirect for an archive entry"))
                    },
                    Err(err) => Err(std::io::Error::other(err.to_string())),
                }
            })
        })
        .collect();

    Ok(zip_stream(entries))
}
