//! Local filesystem object store.
//!
//! Objects are files below a configured root directory, accessed via
//! `tokio::fs` for async I/O. Useful for serving repositories straight from a
//! web server's document root, and for testing `mkrepo` against a directory.

use crate::error::{ErrorKind, Result};
use crate::key::{validate as validate_key, validate_prefix};
use crate::{Listing, ObjectStore};
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;

const DIRECTORY_DELIMITER: &str = "/";

/// Local filesystem object store.
///
/// # Examples
///
/// ```no_run
/// use pkgrepo_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalBackend::new("local", "/srv/repos")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory of the store
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new local filesystem store.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not absolute, or exists and is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
            }
        } else {
            // Only happens once at startup; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root.display().to_string()))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Validates the key and joins it with the root directory.
    fn absolute_path(&self, key: &str) -> Result<PathBuf> {
        let validated = validate_key(key)?;
        Ok(self.root.join(validated))
    }

    /// Converts a path below the root back into an object key.
    fn relative_key(&self, absolute: &Path) -> Result<String> {
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{}` is not within root `{}`", absolute.display(), self.root.display()))
        })?;
        let Some(relative) = relative.to_str() else {
            exn::bail!(ErrorKind::InvalidKey(relative.display().to_string()));
        };
        validate_key(relative)
    }

    fn map_io_error(e: std::io::Error, key: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(key.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(key.to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    /// One level of a directory listing: subdirectories become prefixes and
    /// files become objects. `prefix` is empty or ends with `/`.
    async fn read_level(&self, prefix: &str) -> Result<Listing> {
        let mut entries = match fs::read_dir(self.root.join(prefix)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Listing::default()),
            Err(err) => exn::bail!(Self::map_io_error(err, prefix)),
        };
        let mut listing = Listing::default();
        while let Some(entry) = entries.next_entry().await.map_err(ErrorKind::Io)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                exn::bail!(ErrorKind::InvalidKey(entry.path().display().to_string()));
            };
            let file_type = entry.file_type().await.map_err(ErrorKind::Io)?;
            if file_type.is_dir() {
                listing.prefixes.push(format!("{prefix}{name}/"));
            } else if file_type.is_file() {
                listing.objects.push(format!("{prefix}{name}"));
            }
        }
        listing.prefixes.sort();
        listing.objects.sort();
        Ok(listing)
    }

    /// Every file key below `start`, depth first.
    async fn walk(&self, start: PathBuf) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                // Consistent with S3: listing something that doesn't exist
                // is empty, not an error.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => exn::bail!(Self::map_io_error(err, &current.display().to_string())),
            };
            while let Some(entry) = entries.next_entry().await.map_err(ErrorKind::Io)? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(ErrorKind::Io)?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file() {
                    keys.push(self.relative_key(&path)?);
                }
                // Anything else is most likely a broken symlink; drop it.
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.absolute_path(key)?;
        // Create parent directories to behave like an object store.
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, key))?;
        }
        Ok(fs::write(&path, data).await.map_err(|e| Self::map_io_error(e, key))?)
    }

    async fn copy(&self, source: &str, destination: &str) -> Result<()> {
        let from = self.absolute_path(source)?;
        let to = self.absolute_path(destination)?;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, destination))?;
        }
        fs::copy(&from, &to).await.map_err(|e| Self::map_io_error(e, source))?;
        Ok(())
    }

    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Listing> {
        let prefix = validate_prefix(prefix)?;
        if delimiter == Some(DIRECTORY_DELIMITER) && (prefix.is_empty() || prefix.ends_with('/')) {
            return self.read_level(&prefix).await;
        }
        // Otherwise walk from the directory holding the prefix, so `a/b`
        // (which may match `a/b/...` and `a/bc`) starts in `a`.
        let start = match prefix.rfind('/') {
            Some(at) => self.root.join(&prefix[..at]),
            None => self.root.clone(),
        };
        let keys = self.walk(start).await?;
        Ok(Listing::group(keys.iter().map(String::as_str), &prefix, delimiter))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.absolute_path(key)?;
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => exn::bail!(Self::map_io_error(e, key)),
        }
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.absolute_path(key)?;
        Ok(fs::read(&path).await.map_err(|e| Self::map_io_error(e, key))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalBackend) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalBackend::new("local", temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
        assert!(LocalBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_absolute_path() {
        let (temp_dir, store) = store();
        let expected = temp_dir.path().join("live/1.10/ubuntu");
        assert_eq!(store.absolute_path("live/1.10/ubuntu").unwrap(), expected);
        assert!(store.absolute_path("../etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_put_creates_directories() {
        let (_temp_dir, store) = store();
        store.put("a/b/c/pkg.rpm", b"data").await.unwrap();
        assert!(store.exists("a/b/c/pkg.rpm").await.unwrap());
        assert_eq!(store.read("a/b/c/pkg.rpm").await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_exists_is_false_for_directories() {
        let (_temp_dir, store) = store();
        store.put("a/b/pkg.rpm", b"data").await.unwrap();
        assert!(!store.exists("a/b").await.unwrap());
        assert!(!store.exists("a/missing.rpm").await.unwrap());
    }

    #[tokio::test]
    async fn test_copy() {
        let (_temp_dir, store) = store();
        store.put("x86_64/Packages/a.noarch.rpm", b"rpm").await.unwrap();
        store.copy("x86_64/Packages/a.noarch.rpm", "aarch64/Packages/a.noarch.rpm").await.unwrap();
        assert_eq!(store.read("aarch64/Packages/a.noarch.rpm").await.unwrap(), b"rpm");
        let err = store.copy("missing.rpm", "dest.rpm").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_one_level() {
        let (_temp_dir, store) = store();
        store.put("live/1.10/fedora/31/x86_64/Packages/a.rpm", b"a").await.unwrap();
        store.put("live/1.10/fedora/31/SRPMS/Packages/a.src.rpm", b"a").await.unwrap();
        store.put("live/1.10/fedora/310/x86_64/Packages/b.rpm", b"b").await.unwrap();
        store.put("live/1.10/fedora/31/README", b"r").await.unwrap();
        let listing = store.list("live/1.10/fedora/31/", Some("/")).await.unwrap();
        assert_eq!(listing.prefixes, ["live/1.10/fedora/31/SRPMS/", "live/1.10/fedora/31/x86_64/"]);
        assert_eq!(listing.objects, ["live/1.10/fedora/31/README"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_one_level_does_not_descend() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (temp_dir, store) = store();
        store.put("live/1.10/ubuntu/pool/focal/main/m/mypkg/mypkg.deb", b"d").await.unwrap();
        // Not a valid key; only a full walk of `pool/` would trip over it.
        std::fs::write(temp_dir.path().join("live/1.10/ubuntu/pool/focal").join(OsStr::from_bytes(b"\xff")), b"x")
            .unwrap();

        let listing = store.list("live/1.10/ubuntu/", Some("/")).await.unwrap();
        assert_eq!(listing.prefixes, ["live/1.10/ubuntu/pool/"]);
        assert!(listing.objects.is_empty());
        assert!(store.list("live/1.10/ubuntu/", None).await.is_err());
    }

    #[tokio::test]
    async fn test_list_missing_prefix_is_empty() {
        let (_temp_dir, store) = store();
        assert!(store.list("release/2.8/ubuntu/", Some("/")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let (_temp_dir, store) = store();
        let err = store.read("nonexistent.deb").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
