//! Destination naming and conflict resolution.

use sluice_provider::error::{ErrorKind, Result};
use sluice_provider::{EntryPath, Metadata, ProviderHandle};

/// What to do when the resolved destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Overwrite the existing entity.
    Replace,
    /// Find a free ` (n)`-suffixed name instead.
    Keep,
    /// Refuse with a naming conflict.
    #[default]
    Warn,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "replace" => Ok(Self::Replace),
            "keep" => Ok(Self::Keep),
            "warn" => Ok(Self::Warn),
            other => Err(format!("conflict must be replace, keep or warn, not '{other}'")),
        }
    }
}

/// The `keep` policy walks suffixes linearly; give up eventually rather
/// than hammer a pathological destination folder forever.
const MAX_SUFFIX_ATTEMPTS: u32 = 128;

/// Compute the destination path for a transfer and apply the conflict
/// policy. Returns the resolved path and whether an existing entity will be
/// replaced by using it.
pub(crate) async fn resolve_destination(
    src_path: &EntryPath,
    dest: &ProviderHandle,
    dest_folder: &EntryPath,
    rename: Option<&str>,
    conflict: ConflictPolicy,
) -> Result<(EntryPath, bool)> {
    if !dest_folder.is_folder() {
        exn::bail!(ErrorKind::InvalidArgument(format!(
            "transfer destination '{dest_folder}' must be a folder"
        )));
    }
    let name = rename.unwrap_or_else(|| src_path.name());
    let target = dest.revalidate_path(dest_folder, name, src_path.is_folder()).await?;

    match probe(dest, &target).await? {
        None => Ok((target, false)),
        Some(_) => match conflict {
            ConflictPolicy::Replace => Ok((target, true)),
            ConflictPolicy::Warn => exn::bail!(ErrorKind::NamingConflict(target.name().to_string())),
            ConflictPolicy::Keep => {
                for count in 1..=MAX_SUFFIX_ATTEMPTS {
                    let candidate = target.with_suffix(count);
                    if probe(dest, &candidate).await?.is_none() {
                        return Ok((candidate, false));
                    }
                }
                exn::bail!(ErrorKind::NamingConflict(target.name().to_string()))
            },
        },
    }
}

/// Existence probe that respects the destination's name-duplication rules:
/// when a provider cannot hold a file and a folder under one name, an
/// entity of the opposite kind blocks the name too.
async fn probe(dest: &ProviderHandle, path: &EntryPath) -> Result<Option<Metadata>> {
    if let Some(metadata) = dest.exists(path).await? {
        return Ok(Some(metadata));
    }
    if !dest.can_duplicate_names() {
        let flipped = EntryPath::from_parts(path.parts().to_vec(), !path.is_folder());
        if let Some(metadata) = dest.exists(&flipped).await? {
            return Ok(Some(metadata));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use sluice_provider::backend::{MemoryProvider, MemoryTree};
    use sluice_provider::StorageProvider;
    use sluice_streams::ByteStream;
    use std::sync::Arc;

    fn mount() -> ProviderHandle {
        Arc::new(MemoryProvider::new(Arc::new(MemoryTree::new()), "mount"))
    }

    async fn put(provider: &ProviderHandle, raw: &str) {
        let path = EntryPath::parse(raw).unwrap();
        provider.upload(ByteStream::from_bytes(&b"x"[..]), &path).await.unwrap();
    }

    #[rstest]
    #[case("replace", ConflictPolicy::Replace)]
    #[case("keep", ConflictPolicy::Keep)]
    #[case("warn", ConflictPolicy::Warn)]
    fn test_policy_from_str(#[case] raw: &str, #[case] expected: ConflictPolicy) {
        assert_eq!(raw.parse::<ConflictPolicy>().unwrap(), expected);
        assert!("overwrite".parse::<ConflictPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_no_conflict_appends_leaf_name() {
        let dest = mount();
        let src = EntryPath::parse("/report.txt").unwrap();
        let folder = EntryPath::parse("/docs/").unwrap();
        dest.create_folder(&folder).await.unwrap();
        let (path, replacing) =
            resolve_destination(&src, &dest, &folder, None, ConflictPolicy::Warn).await.unwrap();
        assert_eq!(path.materialized(), "/docs/report.txt");
        assert!(!replacing);
    }

    #[tokio::test]
    async fn test_rename_overrides_leaf_name() {
        let dest = mount();
        let src = EntryPath::parse("/report.txt").unwrap();
        let (path, _) =
            resolve_destination(&src, &dest, &EntryPath::root(), Some("renamed.txt"), ConflictPolicy::Warn)
                .await
                .unwrap();
        assert_eq!(path.materialized(), "/renamed.txt");
    }

    #[tokio::test]
    async fn test_warn_conflicts_on_existing() {
        let dest = mount();
        put(&dest, "/report.txt").await;
        let src = EntryPath::parse("/report.txt").unwrap();
        let err =
            resolve_destination(&src, &dest, &EntryPath::root(), None, ConflictPolicy::Warn).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NamingConflict(_)));
    }

    #[tokio::test]
    async fn test_replace_keeps_name_and_flags_overwrite() {
        let dest = mount();
        put(&dest, "/report.txt").await;
        let src = EntryPath::parse("/report.txt").unwrap();
        let (path, replacing) =
            resolve_destination(&src, &dest, &EntryPath::root(), None, ConflictPolicy::Replace).await.unwrap();
        assert_eq!(path.materialized(), "/report.txt");
        assert!(replacing);
    }

    #[tokio::test]
    async fn test_keep_increments_until_free() {
        let dest = mount();
        put(&dest, "/report.txt").await;
        put(&dest, "/report (1).txt").await;
        let src = EntryPath::parse("/report.txt").unwrap();
        let (path, replacing) =
            resolve_destination(&src, &dest, &EntryPath::root(), None, ConflictPolicy::Keep).await.unwrap();
        assert_eq!(path.materialized(), "/report (2).txt");
        assert!(!replacing);
    }

    #[tokio::test]
    async fn test_destination_must_be_folder() {
        let dest = mount();
        let src = EntryPath::parse("/a.txt").unwrap();
        let not_folder = EntryPath::parse("/b.txt").unwrap();
        let err = resolve_destination(&src, &dest, &not_folder, None, ConflictPolicy::Warn).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));
    }
}
