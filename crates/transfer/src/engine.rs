//! Transfer dispatch: no-op, native, or streamed.

use crate::naming::{self, ConflictPolicy};
use exn::ResultExt;
use futures::future::BoxFuture;
use sluice_provider::error::{ErrorKind, Result};
use sluice_provider::{EntryPath, FileMetadata, Metadata, ProviderHandle};
use sluice_streams::HashAlgorithm;
use std::time::Duration;

/// Transfers that take longer than this between chunks are presumed dead.
const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(600);

/// Whether the source is kept (copy) or deleted after verification (move).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Copy,
    Move,
}

/// Caller-supplied knobs for one transfer.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Replace the leaf name at the destination.
    pub rename: Option<String>,
    /// What to do when the destination name is taken.
    pub conflict: ConflictPolicy,
    /// Abort a streamed transfer after this much inactivity.
    pub inactivity_timeout: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self { rename: None, conflict: ConflictPolicy::default(), inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT }
    }
}

/// The result of a successful transfer.
#[derive(Debug)]
pub struct TransferOutcome {
    /// Metadata of the destination entity; folders include their immediate
    /// children.
    pub metadata: Metadata,
    /// Whether a new entity was created (`false` when one was replaced, or
    /// when a move was a no-op).
    pub created: bool,
    /// Set when the operation succeeded with a caveat, e.g. a move whose
    /// source could not be deleted after a verified copy.
    pub warning: Option<String>,
}

/// Copy or move the entity at `src_path` into the folder `dest_folder` on
/// the destination provider.
///
/// Conflict resolution happens once, at the top; recursion into folders
/// runs with replace semantics against the freshly created destination.
pub async fn transfer(
    kind: TransferKind,
    src: &ProviderHandle,
    src_path: &EntryPath,
    dest: &ProviderHandle,
    dest_folder: &EntryPath,
    options: TransferOptions,
) -> Result<TransferOutcome> {
    let (dest_path, _replacing) =
        naming::resolve_destination(src_path, dest, dest_folder, options.rename.as_deref(), options.conflict)
            .await?;

    // Moving an entity onto itself within one store is a no-op, not a
    // destructive copy-then-delete.
    if kind == TransferKind::Move && src.shares_storage_root(dest.as_ref()) && *src_path == dest_path {
        let metadata = src.metadata(src_path, None).await?;
        return Ok(TransferOutcome { metadata, created: false, warning: None });
    }

    transfer_resolved(kind, src, src_path, dest, &dest_path, &options).await
}

/// Dispatch once the destination path is final. Boxed because folder
/// recursion re-enters here for every child.
fn transfer_resolved<'a>(
    kind: TransferKind,
    src: &'a ProviderHandle,
    src_path: &'a EntryPath,
    dest: &'a ProviderHandle,
    dest_path: &'a EntryPath,
    options: &'a TransferOptions,
) -> BoxFuture<'a, Result<TransferOutcome>> {
    Box::pin(async move {
        let native = match kind {
            TransferKind::Move => src.can_intra_move(dest.as_ref(), src_path),
            TransferKind::Copy => src.can_intra_copy(dest.as_ref(), src_path),
        };
        if native {
            let (metadata, created) = match kind {
                TransferKind::Move => src.intra_move(dest.as_ref(), src_path, dest_path).await?,
                TransferKind::Copy => src.intra_copy(dest.as_ref(), src_path, dest_path).await?,
            };
            return Ok(TransferOutcome { metadata, created, warning: None });
        }

        if src_path.is_folder() {
            return transfer_folder(kind, src, src_path, dest, dest_path, options).await;
        }

        let (metadata, created) = stream_file(src, src_path, dest, dest_path, options).await?;
        let warning = match kind {
            TransferKind::Move => delete_source(src, src_path).await,
            TransferKind::Copy => None,
        };
        Ok(TransferOutcome { metadata: Metadata::File(metadata), created, warning })
    })
}

/// Recreate the folder at the destination and recurse over the children in
/// source order. Already-transferred children stay put if a later one
/// fails; the error carries the failing child's path.
async fn transfer_folder(
    kind: TransferKind,
    src: &ProviderHandle,
    src_path: &EntryPath,
    dest: &ProviderHandle,
    dest_path: &EntryPath,
    options: &TransferOptions,
) -> Result<TransferOutcome> {
    let existed = dest.exists(dest_path).await?.is_some();
    if existed {
        dest.delete(dest_path, false).await?;
    }
    let mut folder = dest.create_folder(dest_path).await?;

    let mut children = Vec::new();
    let mut warning = None;
    for item in src.children(src_path).await? {
        let child_src = src.revalidate_path(src_path, item.name(), item.is_folder()).await?;
        let child_dest = dest.revalidate_path(dest_path, item.name(), item.is_folder()).await?;
        let outcome = transfer_resolved(kind, src, &child_src, dest, &child_dest, options).await?;
        if warning.is_none() {
            warning = outcome.warning;
        }
        children.push(outcome.metadata);
    }

    if kind == TransferKind::Move {
        if let Some(partial) = delete_source(src, src_path).await {
            warning.get_or_insert(partial);
        }
    }

    folder.children = Some(children);
    Ok(TransferOutcome { metadata: Metadata::Folder(folder), created: !existed, warning })
}

/// Stream one file from source to destination with a digest on the wire,
/// then verify the two sides agree.
async fn stream_file(
    src: &ProviderHandle,
    src_path: &EntryPath,
    dest: &ProviderHandle,
    dest_path: &EntryPath,
    options: &TransferOptions,
) -> Result<(FileMetadata, bool)> {
    let download = src.download(src_path, None, None, false).await?;
    let mut stream = download.into_stream()?;

    if dest.requires_known_length() && stream.size().is_none() {
        stream = stream
            .spool_to_temp()
            .await
            .or_raise(|| ErrorKind::Provider("failed to spool size-unknown source".to_string()))?;
    }

    let stream = stream.stalled_after(options.inactivity_timeout);
    let declared = stream.size();
    let (stream, observer) = stream.observe(&[HashAlgorithm::Sha256]);
    let (mut metadata, created) = dest.upload(stream, dest_path).await?;

    if let Some(source_digests) = observer.digests() {
        let mut compared = false;
        for (algorithm, source_hex) in &source_digests {
            if let Some(dest_hex) = metadata.hashes.get(algorithm) {
                if dest_hex != source_hex {
                    exn::bail!(ErrorKind::HashMismatch {
                        algorithm: algorithm.clone(),
                        source: source_hex.clone(),
                        destination: dest_hex.clone(),
                    });
                }
                compared = true;
            }
        }
        if !compared {
            // The destination reported no shared algorithm; trust the wire
            // digests and surface them on the returned metadata.
            for (algorithm, hex) in source_digests {
                metadata.hashes.entry(algorithm).or_insert(hex);
            }
        }
    } else if let (Some(expected), Some(received)) = (declared, metadata.size) {
        // Neither side produced a digest. Size equality is the last check.
        if expected != received {
            exn::bail!(ErrorKind::UploadIncomplete { expected, received });
        }
    }

    Ok((metadata, created))
}

/// Delete the source after a verified copy. Failure is reported, not
/// raised: the bytes are safe at the destination.
async fn delete_source(src: &ProviderHandle, src_path: &EntryPath) -> Option<String> {
    match src.delete(src_path, false).await {
        Ok(()) => None,
        Err(err) => {
            tracing::warn!(path = %src_path, error = %err, "partial move: source survived a verified copy");
            Some(format!("partial move: '{src_path}' was copied but the source could not be deleted"))
        },
    }
}
