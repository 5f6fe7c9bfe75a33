//! In-memory storage backend.
//!
//! Entries live in ordered maps behind a [`RwLock`], so all trait methods
//! operate on `&self`. The tree itself ([`MemoryTree`]) is owned by whoever
//! mounts the provider and handed to each per-request instance as an `Arc`,
//! playing the role a remote service plays for network backends. Every
//! upload appends a revision, which makes this the one built-in backend with
//! real version history.

use crate::error::{ErrorKind, Result};
use crate::metadata::{FileMetadata, FolderMetadata, Metadata, RevisionMetadata};
use crate::path::EntryPath;
use crate::provider::{ByteRange, Download, StorageProvider};
use async_trait::async_trait;
use bytes::Bytes;
use sluice_streams::{ByteStream, HashAlgorithm};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredRevision {
    version: String,
    data: Bytes,
    modified: OffsetDateTime,
    hashes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
struct StoredFile {
    revisions: Vec<StoredRevision>,
}

impl StoredFile {
    fn latest(&self) -> &StoredRevision {
        self.revisions.last().expect("stored file always has at least one revision")
    }

    fn at_version(&self, version: &str) -> Option<&StoredRevision> {
        self.revisions.iter().find(|revision| revision.version == version)
    }
}

#[derive(Debug)]
struct TreeState {
    /// Folder paths, trailing slash, `/` always present.
    folders: BTreeSet<String>,
    /// File paths, no trailing slash.
    files: BTreeMap<String, StoredFile>,
}

/// The backing store for one memory mount, shared across requests.
#[derive(Debug)]
pub struct MemoryTree {
    state: RwLock<TreeState>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self { state: RwLock::new(TreeState { folders: BTreeSet::from(["/".to_string()]), files: BTreeMap::new() }) }
    }
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory storage provider bound to a [`MemoryTree`] mount.
#[derive(Debug)]
pub struct MemoryProvider {
    tree: Arc<MemoryTree>,
    mount: String,
}

impl MemoryProvider {
    pub fn new(tree: Arc<MemoryTree>, mount: impl Into<String>) -> Self {
        Self { tree, mount: mount.into() }
    }

    fn file_metadata(&self, path: &str, revision: &StoredRevision) -> FileMetadata {
        let name = path.rsplit('/').next().unwrap_or("").to_string();
        let mut metadata = FileMetadata::new(name.clone(), path, self.name());
        metadata.size = Some(revision.data.len() as u64);
        metadata.content_type = mime_guess::from_path(&name).first().map(|mime| mime.to_string());
        metadata.modified = Some(revision.modified);
        metadata.etag = revision.hashes.get(HashAlgorithm::Sha256.name()).cloned();
        metadata.hashes = revision.hashes.clone();
        metadata.extra.insert("version".to_string(), serde_json::Value::from(revision.version.clone()));
        metadata
    }

    fn folder_metadata(&self, path: &str) -> FolderMetadata {
        let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or("").to_string();
        FolderMetadata::new(name, path, self.name())
    }

    /// Register `path`'s ancestor folders, mirroring filesystem providers
    /// that create parent directories on write.
    fn ensure_ancestors(state: &mut TreeState, path: &EntryPath) {
        let mut current = path.parent();
        loop {
            state.folders.insert(current.materialized());
            if current.is_root() {
                break;
            }
            current = current.parent();
        }
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn storage_root_id(&self) -> String {
        self.mount.clone()
    }

    async fn validate_path(&self, raw: &str) -> Result<EntryPath> {
        EntryPath::parse(raw)
    }

    async fn metadata(&self, path: &EntryPath, version: Option<&str>) -> Result<Metadata> {
        let state = self.tree.state.read().await;
        let key = path.materialized();
        if path.is_folder() {
            if !state.folders.contains(&key) {
                exn::bail!(ErrorKind::NotFound(key));
            }
            return Ok(self.folder_metadata(&key).into());
        }
        let file = state.files.get(&key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?;
        let revision = match version {
            Some(version) => {
                file.at_version(version).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?
            },
            None => file.latest(),
        };
        Ok(self.file_metadata(&key, revision).into())
    }

    async fn children(&self, path: &EntryPath) -> Result<Vec<Metadata>> {
        let state = self.tree.state.read().await;
        let prefix = path.materialized();
        if !state.folders.contains(&prefix) {
            exn::bail!(ErrorKind::NotFound(prefix));
        }
        let mut listing = Vec::new();
        for folder in &state.folders {
            let Some(rest) = folder.strip_prefix(prefix.as_str()) else { continue };
            if rest.is_empty() {
                continue;
            }
            if !rest.trim_end_matches('/').contains('/') {
                listing.push(self.folder_metadata(folder).into());
            }
        }
        for (file, stored) in &state.files {
            let Some(rest) = file.strip_prefix(prefix.as_str()) else { continue };
            if rest.is_empty() || rest.contains('/') {
                continue;
            }
            listing.push(self.file_metadata(file, stored.latest()).into());
        }
        Ok(listing)
    }

    async fn download(
        &self,
        path: &EntryPath,
        version: Option<&str>,
        range: Option<ByteRange>,
        _accept_redirect: bool,
    ) -> Result<Download> {
        let state = self.tree.state.read().await;
        let key = path.materialized();
        let file = state.files.get(&key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?;
        let revision = match version {
            Some(version) => {
                file.at_version(version).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?
            },
            None => file.latest(),
        };
        let data = match range {
            Some(ByteRange { start, end }) => {
                let len = revision.data.len() as u64;
                if start >= len {
                    exn::bail!(ErrorKind::InvalidArgument(format!("range start {start} beyond size {len}")));
                }
                let end = end.map(|end| (end + 1).min(len)).unwrap_or(len);
                revision.data.slice(start as usize..end as usize)
            },
            None => revision.data.clone(),
        };
        Ok(Download::Stream(ByteStream::from_bytes(data)))
    }

    async fn upload(&self, stream: ByteStream, path: &EntryPath) -> Result<(FileMetadata, bool)> {
        let declared = stream.size();
        let (stream, observer) = stream.observe(&[HashAlgorithm::Md5, HashAlgorithm::Sha256]);
        let data = Bytes::from(stream.collect().await.or_raise_storage()?);
        if let Some(expected) = declared {
            if expected != data.len() as u64 {
                exn::bail!(ErrorKind::UploadIncomplete { expected, received: data.len() as u64 });
            }
        }
        let hashes = observer.digests().unwrap_or_default();

        let mut state = self.tree.state.write().await;
        Self::ensure_ancestors(&mut state, path);
        let key = path.materialized();
        let file = state.files.entry(key.clone()).or_default();
        let created = file.revisions.is_empty();
        let revision = StoredRevision {
            version: format!("{}", file.revisions.len() + 1),
            data,
            modified: OffsetDateTime::now_utc(),
            hashes,
        };
        file.revisions.push(revision);
        let metadata = self.file_metadata(&key, file.latest());
        Ok((metadata, created))
    }

    async fn delete(&self, path: &EntryPath, confirm_delete: bool) -> Result<()> {
        let mut state = self.tree.state.write().await;
        let key = path.materialized();
        if path.is_root() {
            if !confirm_delete {
                exn::bail!(ErrorKind::InvalidArgument(
                    "deleting the root requires confirm_delete".to_string()
                ));
            }
            state.files.clear();
            state.folders.retain(|folder| folder == "/");
            return Ok(());
        }
        if path.is_file() {
            state.files.remove(&key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?;
            return Ok(());
        }
        if !state.folders.remove(&key) {
            exn::bail!(ErrorKind::NotFound(key));
        }
        state.folders.retain(|folder| !folder.starts_with(&key));
        state.files.retain(|file, _| !file.starts_with(&key));
        Ok(())
    }

    async fn create_folder(&self, path: &EntryPath) -> Result<FolderMetadata> {
        if !path.is_folder() || path.is_root() {
            exn::bail!(ErrorKind::InvalidPath(format!("'{path}' is not a creatable folder path")));
        }
        let mut state = self.tree.state.write().await;
        let key = path.materialized();
        if state.folders.contains(&key) {
            exn::bail!(ErrorKind::NamingConflict(path.name().to_string()));
        }
        Self::ensure_ancestors(&mut state, path);
        state.folders.insert(key.clone());
        Ok(self.folder_metadata(&key))
    }

    async fn revisions(&self, path: &EntryPath) -> Result<Vec<RevisionMetadata>> {
        let state = self.tree.state.read().await;
        let key = path.materialized();
        let file = state.files.get(&key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?;
        Ok(file
            .revisions
            .iter()
            .rev()
            .map(|revision| {
                let mut meta = RevisionMetadata::new(revision.version.clone());
                meta.modified = Some(revision.modified);
                meta
            })
            .collect())
    }

    fn can_intra_copy(&self, other: &dyn StorageProvider, _path: &EntryPath) -> bool {
        self.shares_storage_root(other)
    }

    fn can_intra_move(&self, other: &dyn StorageProvider, path: &EntryPath) -> bool {
        self.can_intra_copy(other, path)
    }

    async fn intra_copy(
        &self,
        _dest: &dyn StorageProvider,
        src_path: &EntryPath,
        dest_path: &EntryPath,
    ) -> Result<(Metadata, bool)> {
        let mut state = self.tree.state.write().await;
        let src_key = src_path.materialized();
        let dest_key = dest_path.materialized();
        if src_path.is_file() {
            let stored =
                state.files.get(&src_key).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(src_key)))?;
            let created = !state.files.contains_key(&dest_key);
            Self::ensure_ancestors(&mut state, dest_path);
            let metadata = self.file_metadata(&dest_key, stored.latest());
            state.files.insert(dest_key, stored);
            return Ok((metadata.into(), created));
        }

        if !state.folders.contains(&src_key) {
            exn::bail!(ErrorKind::NotFound(src_key));
        }
        let created = !state.folders.contains(&dest_key);
        Self::ensure_ancestors(&mut state, dest_path);
        let copied_folders: Vec<String> = state
            .folders
            .iter()
            .filter(|folder| folder.starts_with(&src_key))
            .map(|folder| format!("{dest_key}{}", &folder[src_key.len()..]))
            .collect();
        let copied_files: Vec<(String, StoredFile)> = state
            .files
            .range(src_key.clone()..)
            .take_while(|(file, _)| file.starts_with(&src_key))
            .map(|(file, stored)| (format!("{dest_key}{}", &file[src_key.len()..]), stored.clone()))
            .collect();
        state.folders.insert(dest_key.clone());
        state.folders.extend(copied_folders);
        state.files.extend(copied_files);
        Ok((self.folder_metadata(&dest_key).into(), created))
    }
}

/// Small shim so `collect()`'s stream error converts into the provider
/// taxonomy without an intermediate map at every call site.
trait StorageResult<T> {
    fn or_raise_storage(self) -> Result<T>;
}

impl<T> StorageResult<T> for sluice_streams::error::Result<T> {
    fn or_raise_storage(self) -> Result<T> {
        use exn::ResultExt;
        self.or_raise(|| ErrorKind::Provider("stream read failed".to_string()))
    }
}
