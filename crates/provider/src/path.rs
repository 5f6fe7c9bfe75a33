//! The validated path model shared by every provider.
//!
//! An [`EntryPath`] is an immutable sequence of named parts plus a
//! file-or-folder tag. The tag is part of identity: `/report` the file and
//! `/report/` the folder are different entries, and the trailing slash that
//! distinguishes them is load-bearing through every serialisation. Parts may
//! carry an opaque backend identifier for providers whose names collide but
//! whose ids do not (think Drive-style id-addressed stores).

use crate::error::{ErrorKind, Result};

/// One level of an [`EntryPath`]: a human-readable name plus an optional
/// backend identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPart {
    name: String,
    id: Option<String>,
}

impl PathPart {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), id: None }
    }

    pub fn with_id(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self { name: name.into(), id: Some(id.into()) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// A standardised, validated, immutable path.
///
/// The root is the empty part sequence and is always a folder. Two paths are
/// equal iff their part sequences (name + id) and their tags are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPath {
    parts: Vec<PathPart>,
    folder: bool,
}

impl EntryPath {
    /// The provider root: empty part list, always a folder.
    pub fn root() -> Self {
        Self { parts: Vec::new(), folder: true }
    }

    /// Parse a raw slash-separated path, inferring the kind from the
    /// trailing slash.
    ///
    /// Rules: must start with `/`; no empty interior segments (`//`); no
    /// `.`/`..` segments; no NUL bytes.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            exn::bail!(ErrorKind::InvalidPath("must specify a path".to_string()));
        }
        if !raw.starts_with('/') {
            exn::bail!(ErrorKind::InvalidPath(format!("'{raw}' must start with a slash")));
        }
        if raw == "/" {
            return Ok(Self::root());
        }
        let folder = raw.ends_with('/');
        let body = raw[1..].strip_suffix('/').unwrap_or(&raw[1..]);
        let mut parts = Vec::new();
        for segment in body.split('/') {
            parts.push(PathPart::new(validate_name(segment, raw)?));
        }
        Ok(Self { parts, folder })
    }

    /// Like [`parse`](Self::parse), but additionally require the trailing
    /// slash to agree with the expected kind.
    pub fn parse_as(raw: &str, folder: bool) -> Result<Self> {
        let path = Self::parse(raw)?;
        if path.folder != folder {
            let expected = if folder { "folder" } else { "file" };
            exn::bail!(ErrorKind::InvalidPath(format!("'{raw}' does not name a {expected}")));
        }
        Ok(path)
    }

    /// Build a path from explicit parts (for id-addressed providers).
    pub fn from_parts(parts: Vec<PathPart>, folder: bool) -> Self {
        if parts.is_empty() {
            return Self::root();
        }
        Self { parts, folder }
    }

    pub fn is_root(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn is_folder(&self) -> bool {
        self.folder
    }

    pub fn is_file(&self) -> bool {
        !self.folder
    }

    /// `"file"` or `"folder"`.
    pub fn kind(&self) -> &'static str {
        if self.folder { "folder" } else { "file" }
    }

    /// The name of the last part; the root's name is the empty string.
    pub fn name(&self) -> &str {
        self.parts.last().map(|part| part.name.as_str()).unwrap_or("")
    }

    /// The last part's file extension including the dot, if any.
    pub fn ext(&self) -> Option<&str> {
        let (_, ext) = split_ext(self.name());
        (!ext.is_empty()).then_some(ext)
    }

    /// The backend identifier of the last part, if any.
    pub fn identifier(&self) -> Option<&str> {
        self.parts.last().and_then(|part| part.id.as_deref())
    }

    pub fn parts(&self) -> &[PathPart] {
        &self.parts
    }

    /// The parent folder. The root's parent is the root itself.
    pub fn parent(&self) -> Self {
        if self.parts.is_empty() {
            return Self::root();
        }
        Self { parts: self.parts[..self.parts.len() - 1].to_vec(), folder: true }
    }

    /// Append a child part. The receiver must be a folder.
    pub fn child(&self, name: &str, id: Option<&str>, folder: bool) -> Result<Self> {
        if !self.folder {
            exn::bail!(ErrorKind::InvalidPath(format!("cannot create a child of file '{self}'")));
        }
        let name = validate_name(name, name)?;
        let part = match id {
            Some(id) => PathPart::with_id(name, id),
            None => PathPart::new(name),
        };
        let mut parts = self.parts.clone();
        parts.push(part);
        Ok(Self { parts, folder })
    }

    /// Replace the last part's name, keeping its identifier and the tag.
    pub fn renamed(&self, name: &str) -> Result<Self> {
        if self.parts.is_empty() {
            exn::bail!(ErrorKind::InvalidPath("cannot rename the root".to_string()));
        }
        let name = validate_name(name, name)?;
        let mut parts = self.parts.clone();
        let last = parts.last_mut().expect("non-root path has a last part");
        last.name = name;
        Ok(Self { parts, folder: self.folder })
    }

    /// The Mac-style conflict rename: `report.txt` becomes `report (1).txt`,
    /// a folder `reports` becomes `reports (1)`.
    pub fn with_suffix(&self, count: u32) -> Self {
        if self.parts.is_empty() {
            return self.clone();
        }
        let mut parts = self.parts.clone();
        let last = parts.last_mut().expect("non-root path has a last part");
        last.name = suffixed_name(&last.name, count, self.folder);
        // A renamed entity no longer has the original's backend id.
        last.id = None;
        Self { parts, folder: self.folder }
    }

    /// The unix-style human-readable representation: leading slash, trailing
    /// slash iff folder, `/` for the root.
    pub fn materialized(&self) -> String {
        if self.parts.is_empty() {
            return "/".to_string();
        }
        let joined = self.parts.iter().map(|part| part.name.as_str()).collect::<Vec<_>>().join("/");
        if self.folder { format!("/{joined}/") } else { format!("/{joined}") }
    }
}

impl std::fmt::Display for EntryPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.materialized())
    }
}

fn validate_name(name: &str, raw: &str) -> Result<String> {
    if name.is_empty() {
        exn::bail!(ErrorKind::InvalidPath(format!("'{raw}' contains an empty segment")));
    }
    if name == "." || name == ".." {
        exn::bail!(ErrorKind::InvalidPath(format!("'{raw}' contains a relative segment")));
    }
    if name.contains('/') || name.contains('\0') {
        exn::bail!(ErrorKind::InvalidPath(format!("'{raw}' contains a forbidden character")));
    }
    Ok(name.to_string())
}

/// Split a name into stem and extension, Python `splitext`-style: the
/// extension of a leading-dot name (`.gitignore`) is empty.
fn split_ext(name: &str) -> (&str, &str) {
    if name.is_empty() {
        return (name, "");
    }
    match name[1..].rfind('.') {
        Some(idx) => name.split_at(idx + 1),
        None => (name, ""),
    }
}

fn suffixed_name(name: &str, count: u32, folder: bool) -> String {
    if folder {
        return format!("{name} ({count})");
    }
    let (stem, ext) = split_ext(name);
    format!("{stem} ({count}){ext}")
}
