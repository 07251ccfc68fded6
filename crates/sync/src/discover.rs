//! Finding the repositories that physically exist in the store.
//!
//! The descriptor says which repositories *may* exist; only the ones that
//! have had packages uploaded actually do. Each [`Scan`] names one prefix to
//! list and how to read the result.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use pkgrepo_layout::{Scan, ScanMode, RepositoryPath, SigningKeys};
use pkgrepo_storage::ObjectStore;

/// Lists one scan's prefix and returns the repositories found under it,
/// each carrying the signing key of the scan's series.
pub async fn discover(store: &dyn ObjectStore, scan: &Scan, signing: &SigningKeys) -> Result<Vec<RepositoryPath>> {
    let listing = store
        .list(&scan.prefix, Some("/"))
        .await
        .or_raise(|| ErrorKind::Discovery(scan.prefix.clone()))?;
    let key = signing.for_series(&scan.series);
    let raw: Vec<&str> = match scan.mode {
        ScanMode::Itself if listing.prefixes.is_empty() => vec![],
        ScanMode::Itself => vec![scan.prefix.as_str()],
        ScanMode::Children => listing.prefixes.iter().map(String::as_str).collect(),
    };
    raw.into_iter()
        .map(|path| {
            RepositoryPath::new(path)
                .map(|repository| repository.with_signing_key(key))
                .or_raise(|| ErrorKind::Discovery(path.to_string()))
        })
        .collect()
}

/// Runs every scan, at most `concurrency` listings at a time.
pub async fn discover_all(
    store: &dyn ObjectStore,
    scans: &[Scan],
    signing: &SigningKeys,
    concurrency: usize,
) -> Result<Vec<RepositoryPath>> {
    let mut pending = scans.iter();
    let mut listing = FuturesUnordered::new();
    listing.extend(pending.by_ref().take(concurrency.max(1)).map(|scan| discover(store, scan, signing)));
    let mut found = Vec::new();
    while let Some(result) = listing.next().await {
        found.extend(result?);
        if let Some(scan) = pending.next() {
            listing.push(discover(store, scan, signing));
        }
    }
    tracing::debug!(scans = scans.len(), repositories = found.len(), "Discovered existing repositories");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgrepo_layout::{Family, Layout, SupportedRepos};
    use pkgrepo_storage::backend::MockBackend;
    use std::collections::HashSet;

    fn store() -> MockBackend {
        MockBackend::with_files([
            ("live/1.10/fedora/31/x86_64/Packages/a.x86_64.rpm", b"a"),
            ("live/1.10/fedora/31/SRPMS/Packages/a.src.rpm", b"a"),
            ("live/modules/fedora/32/aarch64/Packages/b.rpm", b"b"),
            ("live/1.10/ubuntu/pool/focal/main/m/mypkg/mypkg.deb", b"d"),
            // Not under any declared version.
            ("live/1.10/fedora/30/x86_64/Packages/old.rpm", b"o"),
        ])
    }

    fn repos() -> SupportedRepos {
        SupportedRepos::new(["live", "release"], ["1.10", "modules"])
            .with_distro("fedora", Family::Rpm, ["31", "32"])
            .with_distro("ubuntu", Family::Deb, ["focal"])
            .with_distro("debian", Family::Deb, ["bookworm"])
    }

    fn signing() -> SigningKeys {
        SigningKeys::new(Some("DEFAULT".to_string())).with_series_key("modules", "MODULES")
    }

    #[tokio::test]
    async fn test_discover_all() {
        let scans = Layout::default().scans(&repos());
        let found = discover_all(&store(), &scans, &signing(), 3).await.unwrap();
        let paths: HashSet<_> = found.iter().map(|r| r.as_str()).collect();
        assert_eq!(
            paths,
            HashSet::from([
                "live/1.10/fedora/31/x86_64",
                "live/1.10/fedora/31/SRPMS",
                "live/modules/fedora/32/aarch64",
                "live/1.10/ubuntu",
            ])
        );
        assert_eq!(found.len(), 4);
    }

    #[tokio::test]
    async fn test_signing_key_follows_series() {
        let scans = Layout::default().scans(&repos());
        let found = discover_all(&store(), &scans, &signing(), 1).await.unwrap();
        for repository in found {
            let expected = if repository.as_str().contains("/modules/") { "MODULES" } else { "DEFAULT" };
            assert_eq!(repository.signing_key(), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_empty_deb_root_is_not_a_repository() {
        let scan = Scan {
            prefix: "live/1.10/debian/".to_string(),
            mode: ScanMode::Itself,
            series: "1.10".to_string(),
        };
        assert!(discover(&store(), &scan, &signing()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure() {
        let scan = Scan { prefix: "../".to_string(), mode: ScanMode::Children, series: "1.10".to_string() };
        let err = discover(&store(), &scan, &signing()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Discovery(_)));
    }
}
