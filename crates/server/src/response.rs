//! JSON-API response shaping and download headers.

use sha2::{Digest, Sha256};
use sluice_provider::{Metadata, RevisionMetadata};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use url::Url;

/// `{data: ...}` for one entity.
pub fn json_api_document(metadata: &Metadata, resource: &str, domain: &str) -> serde_json::Value {
    serde_json::json!({ "data": entity(metadata, resource, domain) })
}

/// `{data: [...]}` for a folder listing.
pub fn json_api_listing(children: &[Metadata], resource: &str, domain: &str) -> serde_json::Value {
    let entries: Vec<_> = children.iter().map(|child| entity(child, resource, domain)).collect();
    serde_json::json!({ "data": entries })
}

/// `{data: [...]}` for a revision listing.
pub fn json_api_revisions(revisions: &[RevisionMetadata]) -> serde_json::Value {
    let entries: Vec<_> = revisions
        .iter()
        .map(|revision| {
            serde_json::json!({
                "id": revision.version,
                "type": "file_versions",
                "attributes": {
                    "version": revision.version,
                    "versionIdentifier": revision.version,
                    "modified": rfc3339(revision.modified),
                    "author": revision.author,
                    "extra": revision.extra,
                },
            })
        })
        .collect();
    serde_json::json!({ "data": entries })
}

fn entity(metadata: &Metadata, resource: &str, domain: &str) -> serde_json::Value {
    let entity_url = entity_url(domain, resource, metadata.provider(), metadata.path());
    let (kind, links) = match metadata {
        Metadata::File(_) => (
            "files",
            serde_json::json!({
                "self": entity_url,
                "move": entity_url,
                "upload": entity_url,
                "download": entity_url,
                "delete": entity_url,
            }),
        ),
        Metadata::Folder(_) => (
            "folders",
            serde_json::json!({
                "self": entity_url,
                "new_folder": entity_url,
                "move": entity_url,
                "upload": entity_url,
                "delete": entity_url,
            }),
        ),
    };

    serde_json::json!({
        "id": format!("{}{}", metadata.provider(), metadata.path()),
        "type": kind,
        "attributes": attributes(metadata),
        "links": links,
    })
}

/// The flat attribute map. The etag is salted with the provider name and
/// hashed so backend tags never leak verbatim.
pub fn attributes(metadata: &Metadata) -> serde_json::Value {
    let mut base = serde_json::json!({
        "kind": metadata.kind(),
        "name": metadata.name(),
        "path": metadata.path(),
        "materialized": metadata.path(),
        "provider": metadata.provider(),
        "etag": metadata.etag().map(|etag| salted_etag(metadata.provider(), etag)),
        "extra": metadata.extra(),
    });
    match metadata {
        Metadata::File(file) => {
            base["size"] = serde_json::json!(file.size);
            base["contentType"] = serde_json::json!(file.content_type);
            base["modified"] = serde_json::json!(rfc3339(file.modified));
            base["created"] = serde_json::json!(rfc3339(file.created));
            base["hashes"] = serde_json::json!(file.hashes);
        },
        Metadata::Folder(folder) => {
            base["size"] = serde_json::Value::Null;
            if let Some(children) = &folder.children {
                let entries: Vec<_> = children.iter().map(attributes).collect();
                base["children"] = serde_json::json!(entries);
            }
        },
    }
    base
}

fn salted_etag(provider: &str, etag: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{provider}::{etag}").as_bytes());
    hex::encode(hasher.finalize())
}

fn rfc3339(timestamp: Option<OffsetDateTime>) -> Option<String> {
    timestamp.and_then(|ts| ts.format(&Rfc3339).ok())
}

/// Absolute action URL for an entity; segments are percent-encoded and a
/// folder's trailing slash survives.
fn entity_url(domain: &str, resource: &str, provider: &str, path: &str) -> Option<String> {
    let mut url = Url::parse(domain).ok()?;
    {
        let mut segments = url.path_segments_mut().ok()?;
        segments.extend(["v1", "resources", resource, "providers", provider]);
        segments.extend(path.split('/').skip(1));
    }
    Some(url.to_string())
}

/// `Content-Disposition` for a download: an ASCII fallback plus an RFC 5987
/// UTF-8 `filename*` when the name needs it.
pub fn make_disposition(name: &str) -> String {
    let fallback: String =
        name.chars().map(|ch| if ch.is_ascii() && ch != '"' && ch != '\\' { ch } else { '_' }).collect();
    if name.is_ascii() && !name.contains('"') && !name.contains('\\') {
        format!("attachment; filename=\"{name}\"")
    } else {
        format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{}", rfc5987_encode(name))
    }
}

fn rfc5987_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len() * 3);
    for byte in value.as_bytes() {
        match byte {
            b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'-' | b'.' | b'_' | b'~' => encoded.push(*byte as char),
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

/// `Last-Modified` in HTTP date format.
pub fn http_date(timestamp: OffsetDateTime) -> String {
    httpdate::fmt_http_date(timestamp.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_provider::{FileMetadata, FolderMetadata};

    fn file() -> Metadata {
        let mut meta = FileMetadata::new("a b.txt", "/docs/a b.txt", "memory");
        meta.size = Some(5);
        meta.etag = Some("tag".to_string());
        meta.hashes.insert("sha256".to_string(), "ff".to_string());
        Metadata::File(meta)
    }

    #[test]
    fn test_file_document_shape() {
        let doc = json_api_document(&file(), "R", "http://localhost:7777");
        let data = &doc["data"];
        assert_eq!(data["type"], "files");
        assert_eq!(data["id"], "memory/docs/a b.txt");
        assert_eq!(data["attributes"]["size"], 5);
        assert_eq!(data["attributes"]["hashes"]["sha256"], "ff");
        let download = data["links"]["download"].as_str().unwrap();
        assert_eq!(download, "http://localhost:7777/v1/resources/R/providers/memory/docs/a%20b.txt");
        assert!(data["links"].get("new_folder").is_none(), "files have no new_folder link");
    }

    #[test]
    fn test_folder_document_keeps_trailing_slash_in_links() {
        let folder = Metadata::Folder(FolderMetadata::new("docs", "/docs/", "memory"));
        let doc = json_api_document(&folder, "R", "http://localhost:7777");
        let upload = doc["data"]["links"]["upload"].as_str().unwrap();
        assert!(upload.ends_with("/providers/memory/docs/"), "got {upload}");
        assert_eq!(doc["data"]["type"], "folders");
        assert_eq!(doc["data"]["attributes"]["size"], serde_json::Value::Null);
    }

    #[test]
    fn test_etag_is_salted_and_hashed() {
        let doc = json_api_document(&file(), "R", "http://localhost:7777");
        let etag = doc["data"]["attributes"]["etag"].as_str().unwrap();
        assert_eq!(etag.len(), 64);
        assert_ne!(etag, "tag");
    }

    #[test]
    fn test_disposition_ascii() {
        assert_eq!(make_disposition("a.txt"), "attachment; filename=\"a.txt\"");
    }

    #[test]
    fn test_disposition_unicode() {
        let disposition = make_disposition("émoji 🎉.txt");
        assert!(disposition.starts_with("attachment; filename=\""));
        assert!(disposition.contains("filename*=UTF-8''"));
        assert!(disposition.contains("%F0%9F%8E%89"), "got {disposition}");
    }
}
