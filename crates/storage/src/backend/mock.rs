//! In-memory object store for testing.

use crate::error::{ErrorKind, Result};
use crate::key::{validate as validate_key, validate_prefix};
use crate::{Listing, ObjectStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-memory object store for testing.
///
/// Objects are stored in a `BTreeMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Counts
/// puts and copies, and can be told to reject writes under a prefix, so tests
/// can check how an upload was carried out and what happens when it fails.
///
/// # Examples
///
/// ```
/// use pkgrepo_storage::{ObjectStore, backend::MockBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MockBackend::with_files([
///     ("live/1.10/ubuntu/dists/focal/Release", b"..."),
/// ]);
/// assert!(store.exists("live/1.10/ubuntu/dists/focal/Release").await?);
///
/// store.put("live/1.10/ubuntu/pool/focal/main/m/mypkg/mypkg.deb", b"data").await?;
/// assert_eq!(store.puts(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<BTreeMap<String, Vec<u8>>>,
    failing_prefix: Option<String>,
    puts: AtomicUsize,
    copies: AtomicUsize,
}

impl MockBackend {
    /// Create a mock store pre-populated with objects.
    ///
    /// Panics if any key fails validation. If test setup is wrong, then test
    /// should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = BTreeMap::new();
        for (key, data) in files {
            let Ok(validated) = validate_key(key.as_ref()) else {
                panic!("MockBackend::with_files: invalid key {}", key.as_ref());
            };
            map.insert(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            failing_prefix: None,
            puts: AtomicUsize::new(0),
            copies: AtomicUsize::new(0),
        }
    }

    /// Change the name of the mock store.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reject every put and copy whose destination starts with `prefix`.
    pub fn with_failing_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.failing_prefix = Some(prefix.into());
        self
    }

    /// Number of successful puts.
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of successful copies.
    pub fn copies(&self) -> usize {
        self.copies.load(Ordering::SeqCst)
    }

    /// Every stored key, in order.
    pub async fn keys(&self) -> Vec<String> {
        self.storage.read().await.keys().cloned().collect()
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        match &self.failing_prefix {
            Some(prefix) if key.starts_with(prefix.as_str()) => {
                exn::bail!(ErrorKind::BackendError(format!("write rejected: {key}")))
            },
            _ => Ok(()),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &[u8]); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl ObjectStore for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let key = validate_key(key)?;
        self.check_writable(&key)?;
        self.storage.write().await.insert(key, data.to_vec());
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn copy(&self, source: &str, destination: &str) -> Result<()> {
        let source = validate_key(source)?;
        let destination = validate_key(destination)?;
        self.check_writable(&destination)?;
        let mut guard = self.storage.write().await;
        let data = guard.get(&source).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(source)))?;
        guard.insert(destination, data);
        self.copies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Listing> {
        let prefix = validate_prefix(prefix)?;
        let guard = self.storage.read().await;
        Ok(Listing::group(guard.keys().map(String::as_str), &prefix, delimiter))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let key = validate_key(key)?;
        Ok(self.storage.read().await.contains_key(&key))
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let key = validate_key(key)?;
        self.storage.read().await.get(&key).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_read() {
        let store = MockBackend::default();
        store.put("a/b.deb", b"hello").await.unwrap();
        assert_eq!(store.read("a/b.deb").await.unwrap(), b"hello");
        assert_eq!(store.puts(), 1);
    }

    #[tokio::test]
    async fn test_copy() {
        let store = MockBackend::with_files([("x86_64/Packages/a.rpm", b"rpm")]);
        store.copy("x86_64/Packages/a.rpm", "aarch64/Packages/a.rpm").await.unwrap();
        assert_eq!(store.read("aarch64/Packages/a.rpm").await.unwrap(), b"rpm");
        assert_eq!(store.copies(), 1);
        assert_eq!(store.puts(), 0);
    }

    #[tokio::test]
    async fn test_copy_not_found() {
        let store = MockBackend::default();
        let err = store.copy("missing", "dest").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert!(!store.exists("dest").await.unwrap());
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let store = MockBackend::default();
        let err = store.read("missing.rpm").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list() {
        let store = MockBackend::with_files([
            ("live/1.10/fedora/31/x86_64/Packages/a.rpm", b"a"),
            ("live/1.10/fedora/31/aarch64/Packages/a.rpm", b"a"),
            ("live/1.10/fedora/32/x86_64/Packages/b.rpm", b"b"),
        ]);
        let listing = store.list("live/1.10/fedora/31/", Some("/")).await.unwrap();
        assert_eq!(listing.prefixes, ["live/1.10/fedora/31/aarch64/", "live/1.10/fedora/31/x86_64/"]);
        assert!(listing.objects.is_empty());
        assert!(store.list("release/", Some("/")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_prefix() {
        let store = MockBackend::with_files([("live/a.rpm", b"a")]).with_failing_prefix("release/");
        let err = store.put("release/a.rpm", b"a").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
        assert!(store.copy("live/a.rpm", "release/b.rpm").await.is_err());
        store.put("live/b.rpm", b"b").await.unwrap();
        assert_eq!(store.keys().await, ["live/a.rpm", "live/b.rpm"]);
    }

    #[tokio::test]
    async fn test_key_traversal_rejected() {
        let store = MockBackend::default();
        assert!(store.read("../etc/passwd").await.is_err());
        assert!(store.put("../escape", b"bad").await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid key")]
    fn test_with_files_panics_on_bad_key() {
        MockBackend::with_files([("../escape", b"bad")]);
    }
}
