//! Local filesystem storage backend.
//!
//! Stores entries under a configured root directory using `tokio::fs`. The
//! root comes from the per-request settings bundle, so different resources
//! mount different directories; two instances rooted at the same directory
//! share a storage root and get native copy/move.

use crate::error::{ErrorKind, Result};
use crate::metadata::{FileMetadata, FolderMetadata, Metadata, RevisionMetadata};
use crate::path::EntryPath;
use crate::provider::{ByteRange, Download, StorageProvider};
use async_trait::async_trait;
use futures::StreamExt;
use sluice_streams::{ByteStream, HashAlgorithm};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Filesystem storage provider rooted at an absolute directory.
#[derive(Debug)]
pub struct FilesystemProvider {
    root: PathBuf,
}

impl FilesystemProvider {
    /// Create a provider rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidArgument(format!("storage root '{}' must be absolute", root.display())));
        }
        std::fs::create_dir_all(&root).map_err(ErrorKind::Io)?;
        Ok(Self { root })
    }

    /// The absolute on-disk location of a validated path. Safe to join
    /// because [`EntryPath`] rejects `.`/`..` segments at parse time.
    fn absolute(&self, path: &EntryPath) -> PathBuf {
        let mut absolute = self.root.clone();
        for part in path.parts() {
            absolute.push(part.name());
        }
        absolute
    }

    fn not_found_or_io(err: std::io::Error, path: &EntryPath) -> ErrorKind {
        if err.kind() == IoErrorKind::NotFound {
            ErrorKind::NotFound(path.materialized())
        } else {
            ErrorKind::Io(err)
        }
    }

    async fn file_metadata(&self, path: &EntryPath) -> Result<FileMetadata> {
        let absolute = self.absolute(path);
        let stat = fs::metadata(&absolute).await.map_err(|err| Self::not_found_or_io(err, path))?;
        if stat.is_dir() {
            exn::bail!(ErrorKind::NotFound(path.materialized()));
        }
        let mut metadata = FileMetadata::new(path.name(), path.materialized(), self.name());
        metadata.size = Some(stat.len());
        metadata.content_type = mime_guess::from_path(&absolute).first().map(|mime| mime.to_string());
        metadata.modified = stat.modified().ok().map(OffsetDateTime::from);
        metadata.created = stat.created().ok().map(OffsetDateTime::from);
        metadata.etag = metadata.modified.map(|modified| format!("{}-{}", stat.len(), modified.unix_timestamp()));
        Ok(metadata)
    }

    fn folder_metadata(&self, path: &EntryPath) -> FolderMetadata {
        FolderMetadata::new(path.name(), path.materialized(), self.name())
    }

    /// Recursive directory copy. `Box::pin` because async recursion needs a
    /// nameable future type.
    fn copy_tree<'a>(
        source: &'a Path,
        dest: &'a Path,
    ) -> futures::future::BoxFuture<'a, std::io::Result<()>> {
        Box::pin(async move {
            fs::create_dir_all(dest).await?;
            let mut entries = fs::read_dir(source).await?;
            while let Some(entry) = entries.next_entry().await? {
                let target = dest.join(entry.file_name());
                if entry.file_type().await?.is_dir() {
                    Self::copy_tree(&entry.path(), &target).await?;
                } else {
                    fs::copy(entry.path(), target).await?;
                }
            }
            Ok(())
        })
    }

    async fn remove_existing(absolute: &Path) -> std::io::Result<()> {
        match fs::metadata(absolute).await {
            Ok(stat) if stat.is_dir() => fs::remove_dir_all(absolute).await,
            Ok(_) => fs::remove_file(absolute).await,
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl StorageProvider for FilesystemProvider {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn storage_root_id(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }

    fn can_duplicate_names(&self) -> bool {
        // A directory and a file cannot share a name on disk.
        false
    }

    async fn validate_path(&self, raw: &str) -> Result<EntryPath> {
        EntryPath::parse(raw)
    }

    async fn metadata(&self, path: &EntryPath, _version: Option<&str>) -> Result<Metadata> {
        if path.is_file() {
            return Ok(self.file_metadata(path).await?.into());
        }
        let absolute = self.absolute(path);
        let stat = fs::metadata(&absolute).await.map_err(|err| Self::not_found_or_io(err, path))?;
        if !stat.is_dir() {
            exn::bail!(ErrorKind::NotFound(path.materialized()));
        }
        Ok(self.folder_metadata(path).into())
    }

    async fn children(&self, path: &EntryPath) -> Result<Vec<Metadata>> {
        let absolute = self.absolute(path);
        let mut entries = fs::read_dir(&absolute).await.map_err(|err| Self::not_found_or_io(err, path))?;
        let mut listing = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(ErrorKind::Io)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().await.map_err(ErrorKind::Io)?.is_dir();
            let child = path.child(&name, None, is_dir)?;
            if is_dir {
                listing.push(self.folder_metadata(&child).into());
            } else {
                listing.push(self.file_metadata(&child).await?.into());
            }
        }
        Ok(listing)
    }

    async fn download(
        &self,
        path: &EntryPath,
        _version: Option<&str>,
        range: Option<ByteRange>,
        _accept_redirect: bool,
    ) -> Result<Download> {
        let absolute = self.absolute(path);
        let stat = fs::metadata(&absolute).await.map_err(|err| Self::not_found_or_io(err, path))?;
        if stat.is_dir() {
            exn::bail!(ErrorKind::NotFound(path.materialized()));
        }
        let mut file = fs::File::open(&absolute).await.map_err(|err| Self::not_found_or_io(err, path))?;
        let len = stat.len();
        let stream = match range {
            Some(ByteRange { start, end }) => {
                if start >= len {
                    exn::bail!(ErrorKind::InvalidArgument(format!("range start {start} beyond size {len}")));
                }
                file.seek(std::io::SeekFrom::Start(start)).await.map_err(ErrorKind::Io)?;
                let limit = end.map(|end| (end + 1).min(len)).unwrap_or(len) - start;
                ByteStream::from_file(file, Some(len - start)).take_exact(limit)
            },
            None => ByteStream::from_file(file, Some(len)),
        };
        Ok(Download::Stream(stream))
    }

    async fn upload(&self, stream: ByteStream, path: &EntryPath) -> Result<(FileMetadata, bool)> {
        let absolute = self.absolute(path);
        let created = !fs::try_exists(&absolute).await.map_err(ErrorKind::Io)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }

        let declared = stream.size();
        let (mut stream, observer) = stream.observe(&[HashAlgorithm::Md5, HashAlgorithm::Sha256]);
        let mut file = fs::File::create(&absolute).await.map_err(ErrorKind::Io)?;
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(ErrorKind::Io)?;
            file.write_all(&chunk).await.map_err(ErrorKind::Io)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(ErrorKind::Io)?;
        drop(file);

        if let Some(expected) = declared {
            if expected != written {
                fs::remove_file(&absolute).await.ok();
                exn::bail!(ErrorKind::UploadIncomplete { expected, received: written });
            }
        }

        let mut metadata = self.file_metadata(path).await?;
        metadata.hashes = observer.digests().unwrap_or_default();
        if let Some(sha256) = metadata.hashes.get(HashAlgorithm::Sha256.name()) {
            metadata.etag = Some(sha256.clone());
        }
        Ok((metadata, created))
    }

    async fn delete(&self, path: &EntryPath, confirm_delete: bool) -> Result<()> {
        let absolute = self.absolute(path);
        if path.is_root() {
            if !confirm_delete {
                exn::bail!(ErrorKind::InvalidArgument("deleting the root requires confirm_delete".to_string()));
            }
            fs::remove_dir_all(&absolute).await.map_err(|err| Self::not_found_or_io(err, path))?;
            fs::create_dir_all(&absolute).await.map_err(ErrorKind::Io)?;
            return Ok(());
        }
        if path.is_file() {
            fs::remove_file(&absolute).await.map_err(|err| Self::not_found_or_io(err, path))?;
        } else {
            fs::remove_dir_all(&absolute).await.map_err(|err| Self::not_found_or_io(err, path))?;
        }
        Ok(())
    }

    async fn create_folder(&self, path: &EntryPath) -> Result<FolderMetadata> {
        if !path.is_folder() || path.is_root() {
            exn::bail!(ErrorKind::InvalidPath(format!("'{path}' is not a creatable folder path")));
        }
        let absolute = self.absolute(path);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }
        match fs::create_dir(&absolute).await {
            Ok(()) => Ok(self.folder_metadata(path)),
            Err(err) if err.kind() == IoErrorKind::AlreadyExists => {
                exn::bail!(ErrorKind::NamingConflict(path.name().to_string()))
            },
            Err(err) => Err(exn::Exn::from(ErrorKind::Io(err))),
        }
    }

    async fn revisions(&self, path: &EntryPath) -> Result<Vec<RevisionMetadata>> {
        // No version history on a plain filesystem; the current state is the
        // only revision.
        let metadata = self.file_metadata(path).await?;
        let mut latest = RevisionMetadata::new("latest");
        latest.modified = metadata.modified;
        Ok(vec![latest])
    }

    fn can_intra_copy(&self, other: &dyn StorageProvider, _path: &EntryPath) -> bool {
        self.shares_storage_root(other)
    }

    fn can_intra_move(&self, other: &dyn StorageProvider, path: &EntryPath) -> bool {
        self.can_intra_copy(other, path)
    }

    async fn intra_copy(
        &self,
        dest: &dyn StorageProvider,
        src_path: &EntryPath,
        dest_path: &EntryPath,
    ) -> Result<(Metadata, bool)> {
        let source = self.absolute(src_path);
        let target = self.absolute(dest_path);
        let existed = fs::try_exists(&target).await.map_err(ErrorKind::Io)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }
        if src_path.is_file() {
            fs::copy(&source, &target).await.map_err(|err| Self::not_found_or_io(err, src_path))?;
        } else {
            Self::remove_existing(&target).await.map_err(ErrorKind::Io)?;
            Self::copy_tree(&source, &target).await.map_err(|err| Self::not_found_or_io(err, src_path))?;
        }
        let metadata = dest.metadata(dest_path, None).await?;
        Ok((metadata, !existed))
    }

    async fn intra_move(
        &self,
        dest: &dyn StorageProvider,
        src_path: &EntryPath,
        dest_path: &EntryPath,
    ) -> Result<(Metadata, bool)> {
        let source = self.absolute(src_path);
        let target = self.absolute(dest_path);
        let existed = fs::try_exists(&target).await.map_err(ErrorKind::Io)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }
        Self::remove_existing(&target).await.map_err(ErrorKind::Io)?;
        fs::rename(&source, &target).await.map_err(|err| Self::not_found_or_io(err, src_path))?;
        let metadata = dest.metadata(dest_path, None).await?;
        Ok((metadata, !existed))
    }
}
