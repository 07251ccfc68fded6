//! Physical repository locations inside the object store.

use crate::error::{ErrorKind, Result};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Normalizes a slash-separated store path.
///
/// Empty segments (leading, trailing or doubled slashes) and `.` segments are
/// dropped, and `..` removes the previous segment. Returns `None` when the
/// path would climb above the store root or contains a null byte.
///
/// ```
/// use pkgrepo_layout::normalize;
/// assert_eq!(normalize("/live//1.10/./fedora/31/").as_deref(), Some("live/1.10/fedora/31"));
/// assert_eq!(normalize("live/../release").as_deref(), Some("release"));
/// assert_eq!(normalize("../etc"), None);
/// ```
pub fn normalize(raw: &str) -> Option<String> {
    if raw.contains('\0') {
        return None;
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                segments.pop()?;
            },
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}

/// One physical repository, e.g. `live/1.10/fedora/31/x86_64` or
/// `live/1.10/ubuntu`.
///
/// Equality and hashing only consider the normalized path; the signing key is
/// an attribute used when regenerating metadata, not part of the identity.
#[derive(Debug, Clone)]
pub struct RepositoryPath {
    path: String,
    signing_key: Option<String>,
}

impl RepositoryPath {
    /// Normalizes `raw` into a repository path.
    ///
    /// Fails with [`InvalidPath`](ErrorKind::InvalidPath) if the path is
    /// empty after normalization or escapes the store root.
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let raw = raw.as_ref();
        match normalize(raw) {
            Some(path) if !path.is_empty() => Ok(Self { path, signing_key: None }),
            _ => exn::bail!(ErrorKind::InvalidPath(raw.to_string())),
        }
    }

    pub fn with_signing_key(mut self, key: Option<impl Into<String>>) -> Self {
        self.signing_key = key.map(Into::into);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Identifier of the key the repository metadata should be signed with.
    pub fn signing_key(&self) -> Option<&str> {
        self.signing_key.as_deref()
    }
}

impl PartialEq for RepositoryPath {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}
impl Eq for RepositoryPath {}

impl Hash for RepositoryPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

// Consistent with `Hash`/`Eq` above, so sets can be queried by `&str`.
impl Borrow<str> for RepositoryPath {
    fn borrow(&self) -> &str {
        &self.path
    }
}

impl AsRef<str> for RepositoryPath {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for RepositoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
