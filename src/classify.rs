use crate::error::{ErrorKind, Result};
use derive_more::Display;
use exn::ResultExt;
use pkgrepo_layout::error::ErrorKind as LayoutErrorKind;
use pkgrepo_layout::normalize;
use pkgrepo_storage::ObjectStore;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    #[display("directory")]
    Directory,
    #[display("file")]
    File,
    #[display("missing")]
    Missing,
}

/// Tells whether `path` names an object, a prefix with objects under it, or
/// nothing at all. The store root is always a directory.
pub async fn classify(store: &dyn ObjectStore, path: &str) -> Result<PathKind> {
    let Some(key) = normalize(path) else {
        exn::bail!(ErrorKind::Request(LayoutErrorKind::InvalidPath(path.to_string())));
    };
    if key.is_empty() {
        return Ok(PathKind::Directory);
    }
    if store.exists(&key).await.or_raise(|| ErrorKind::Storage(key.clone()))? {
        return Ok(PathKind::File);
    }
    let prefix = format!("{key}/");
    let listing = store.list(&prefix, Some("/")).await.or_raise(|| ErrorKind::Storage(prefix.clone()))?;
    Ok(if listing.is_empty() { PathKind::Missing } else { PathKind::Directory })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgrepo_storage::backend::MockBackend;
    use rstest::rstest;

    #[rstest]
    #[case::root("", PathKind::Directory)]
    #[case::slash("/", PathKind::Directory)]
    #[case::object("live/1.10/fedora/31/x86_64/Packages/a.rpm", PathKind::File)]
    #[case::prefix("live/1.10/fedora", PathKind::Directory)]
    #[case::trailing_slash("/live/1.10/fedora/31/", PathKind::Directory)]
    #[case::sibling_name("live/1.1", PathKind::Missing)]
    #[case::missing("release", PathKind::Missing)]
    #[tokio::test]
    async fn test_classify(#[case] path: &str, #[case] expected: PathKind) {
        let store = MockBackend::with_files([("live/1.10/fedora/31/x86_64/Packages/a.rpm", b"a")]);
        assert_eq!(classify(&store, path).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_escaping_path_is_rejected() {
        let err = classify(&MockBackend::default(), "../secrets").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Request(LayoutErrorKind::InvalidPath(_))));
    }
}
