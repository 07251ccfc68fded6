//! Object store trait and implementations.
//!
//! This module defines the [`ObjectStore`] trait, the narrow interface the
//! publisher and the sync workers need from wherever repositories are kept
//! (local filesystem, S3-compatible services, or memory for tests).

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// One level of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Child prefixes, each ending with the delimiter.
    pub prefixes: Vec<String>,
    /// Keys of the objects directly at this level.
    pub objects: Vec<String>,
}

impl Listing {
    /// Groups `keys` the way S3 does for a `ListObjectsV2` request with the
    /// given prefix and delimiter: keys containing the delimiter after the
    /// prefix are rolled up into a common prefix.
    pub fn group<'a>(keys: impl IntoIterator<Item = &'a str>, prefix: &str, delimiter: Option<&str>) -> Self {
        let mut prefixes = BTreeSet::new();
        let mut objects = BTreeSet::new();
        for key in keys {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            match delimiter.filter(|d| !d.is_empty()).and_then(|d| rest.find(d).map(|at| at + d.len())) {
                Some(end) => prefixes.insert(format!("{prefix}{}", &rest[..end])),
                None => objects.insert(key.to_string()),
            };
        }
        Self {
            prefixes: prefixes.into_iter().collect(),
            objects: objects.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.objects.is_empty()
    }
}

/// Unified interface for object stores.
///
/// # Keys
/// Keys are `/`-separated and relative to the store root. Implementations
/// validate them with [`validate_key`](crate::validate_key) before use.
///
/// # Examples
///
/// ```
/// use pkgrepo_storage::{ObjectStore, error::Result};
///
/// async fn publish_twice(store: &dyn ObjectStore, data: &[u8]) -> Result<()> {
///     store.put("live/1.10/fedora/31/x86_64/Packages/pkg-1.0.noarch.rpm", data).await?;
///     store.copy(
///         "live/1.10/fedora/31/x86_64/Packages/pkg-1.0.noarch.rpm",
///         "live/1.10/fedora/31/aarch64/Packages/pkg-1.0.noarch.rpm",
///     ).await
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Write an object, replacing any existing one.
    async fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Store-side copy of an existing object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the source
    /// does not exist.
    async fn copy(&self, source: &str, destination: &str) -> Result<()>;

    /// List one level below `prefix` when a delimiter is given, or every key
    /// under it otherwise. Listing a prefix with nothing under it is an empty
    /// [`Listing`], not an error.
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Listing>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Read a whole object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 5] = [
        "live/1.10/fedora/31/x86_64/Packages/a.rpm",
        "live/1.10/fedora/31/x86_64/repodata/repomd.xml",
        "live/1.10/fedora/31/SRPMS/Packages/a.src.rpm",
        "live/1.10/fedora/31/README",
        "live/1.10/fedora/310/x86_64/Packages/b.rpm",
    ];

    #[test]
    fn test_group_one_level() {
        let listing = Listing::group(KEYS, "live/1.10/fedora/31/", Some("/"));
        assert_eq!(listing.prefixes, ["live/1.10/fedora/31/SRPMS/", "live/1.10/fedora/31/x86_64/"]);
        assert_eq!(listing.objects, ["live/1.10/fedora/31/README"]);
    }

    #[test]
    fn test_group_without_delimiter() {
        let listing = Listing::group(KEYS, "live/1.10/fedora/31/x86_64/", None);
        assert!(listing.prefixes.is_empty());
        assert_eq!(listing.objects.len(), 2);
    }

    #[test]
    fn test_group_prefix_without_trailing_delimiter() {
        let listing = Listing::group(KEYS, "live/1.10/fedora/31", Some("/"));
        assert_eq!(listing.prefixes, ["live/1.10/fedora/31/", "live/1.10/fedora/310/"]);
        assert!(listing.objects.is_empty());
    }

    #[test]
    fn test_group_nothing() {
        assert!(Listing::group(KEYS, "release/", Some("/")).is_empty());
    }
}
