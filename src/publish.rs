use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use pkgrepo_layout::error::ErrorKind as LayoutErrorKind;
use pkgrepo_layout::{Anchors, Layout, RepositoryCoordinate, RepositoryPath, SigningKeys, SupportedRepos};
use pkgrepo_storage::StoreHandle;
use pkgrepo_sync::{SyncCoordinator, discover};
use std::collections::{HashMap, HashSet};

/// Debug symbol packages; never published.
const SKIPPED_SUFFIX: &str = ".ddeb";

/// Package files to publish under one request path.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    /// `kind/series/distro/version`, any segment of which may be an anchor.
    pub path: String,
    /// Required by deb distributions, which pool files by product.
    pub product: Option<String>,
    /// Filename and contents, in upload order.
    pub files: Vec<(String, Vec<u8>)>,
}

/// What an [`Upload`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Keys written, in write order.
    pub written: Vec<String>,
    /// Filenames that were not published.
    pub skipped: Vec<String>,
    /// Repositories marked dirty, in first-write order.
    pub repositories: Vec<RepositoryPath>,
}

/// Publishes packages into the store and queues the repositories they land
/// in for metadata regeneration.
#[derive(Clone)]
pub struct Publisher {
    store: StoreHandle,
    repos: SupportedRepos,
    anchors: Anchors,
    layout: Layout,
    signing: SigningKeys,
    sync: SyncCoordinator,
}

impl Publisher {
    pub fn new(store: StoreHandle, repos: SupportedRepos, sync: SyncCoordinator) -> Self {
        Self {
            store,
            repos,
            anchors: Anchors::new(),
            layout: Layout::default(),
            signing: SigningKeys::default(),
            sync,
        }
    }

    pub fn with_anchors(mut self, anchors: Anchors) -> Self {
        self.anchors = anchors;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_signing_keys(mut self, signing: SigningKeys) -> Self {
        self.signing = signing;
        self
    }

    pub fn sync(&self) -> &SyncCoordinator {
        &self.sync
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    fn coordinates(&self, path: &str) -> Result<Vec<RepositoryCoordinate>> {
        pkgrepo_layout::expand(path, &self.anchors, &self.repos).map_err(ErrorKind::request)
    }

    fn repository(&self, placement: &RepositoryPath, coordinate: &RepositoryCoordinate) -> RepositoryPath {
        placement.clone().with_signing_key(self.signing.for_series(coordinate.series()))
    }

    /// Writes every file to every placement of every coordinate the path
    /// expands to.
    ///
    /// Filenames must be unique within one upload. All placements are resolved before anything is written, so a request
    /// with one bad file writes nothing. Each file is uploaded once; its
    /// other placements are store-side copies of that first object. A
    /// repository is marked dirty as soon as a write into it succeeds, so a
    /// store failure part way through still leaves the written part
    /// regenerated.
    #[tracing::instrument(skip_all, fields(path = %upload.path, files = upload.files.len()))]
    pub async fn upload(&self, upload: &Upload) -> Result<UploadReport> {
        let coordinates = self.coordinates(&upload.path)?;
        let mut report = UploadReport::default();
        let mut names = HashSet::new();
        for (filename, _) in &upload.files {
            if !names.insert(filename.as_str()) {
                exn::bail!(ErrorKind::Request(LayoutErrorKind::InvalidArtifact(filename.clone())));
            }
        }
        let mut writes = Vec::new();
        for (filename, data) in &upload.files {
            if filename.ends_with(SKIPPED_SUFFIX) {
                tracing::warn!(file = %filename, "Skipping debug symbol package");
                report.skipped.push(filename.clone());
                continue;
            }
            for coordinate in &coordinates {
                let placements = self
                    .layout
                    .resolve(coordinate, filename, upload.product.as_deref())
                    .map_err(ErrorKind::request)?;
                writes.extend(placements.into_iter().map(|p| (filename.as_str(), data, coordinate, p)));
            }
        }

        // Filename to the key it was first written to.
        let mut origins: HashMap<&str, String> = HashMap::new();
        let mut dirtied = HashSet::new();
        for (filename, data, coordinate, placement) in writes {
            let written = match origins.get(filename) {
                Some(origin) => self.store.copy(origin, &placement.key).await,
                None => self.store.put(&placement.key, data).await,
            };
            written.or_raise(|| ErrorKind::Storage(placement.key.clone()))?;
            tracing::debug!(file = %filename, key = %placement.key, "Wrote package");
            origins.entry(filename).or_insert_with(|| placement.key.clone());
            let repository = self.repository(&placement.repository, coordinate);
            if dirtied.insert(repository.clone()) {
                self.sync.mark_dirty(repository.clone());
                report.repositories.push(repository);
            }
            report.written.push(placement.key);
        }
        tracing::info!(
            written = report.written.len(),
            repositories = report.repositories.len(),
            skipped = report.skipped.len(),
            "Upload complete"
        );
        Ok(report)
    }

    /// Marks every existing repository of the coordinates `path` expands to
    /// as dirty.
    ///
    /// Coordinates without a repository are skipped with a warning. Fails
    /// with [`RepositoryNotFound`](ErrorKind::RepositoryNotFound) when none
    /// of them exist in the store.
    #[tracing::instrument(skip(self))]
    pub async fn update(&self, path: &str) -> Result<Vec<RepositoryPath>> {
        let coordinates = self.coordinates(path)?;
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for coordinate in &coordinates {
            let scan = self.layout.scan(coordinate);
            let repositories = discover(self.store.as_ref(), &scan, &self.signing)
                .await
                .or_raise(|| ErrorKind::Storage(scan.prefix.clone()))?;
            if repositories.is_empty() {
                tracing::warn!(coordinate = %coordinate, prefix = %scan.prefix, "No repository to update");
            }
            // Deb versions of one distribution share a repository.
            found.extend(repositories.into_iter().filter(|repository| seen.insert(repository.clone())));
        }
        if found.is_empty() {
            exn::bail!(ErrorKind::RepositoryNotFound(path.to_string()));
        }
        for repository in &found {
            self.sync.mark_dirty(repository.clone());
        }
        tracing::info!(repositories = found.len(), "Queued repositories for update");
        Ok(found)
    }

    /// Regenerates every repository that exists in the store.
    pub async fn reconcile(&self) -> Result<usize> {
        self.sync
            .startup_reconciliation(self.store.as_ref(), &self.layout, &self.repos, &self.signing)
            .await
            .or_raise(|| ErrorKind::Sync)
    }
}
