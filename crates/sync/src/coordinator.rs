use crate::dirty::DirtySet;
use crate::discover::discover_all;
use crate::error::{ErrorKind, Result};
use crate::generator::GeneratorHandle;
use crate::worker::{Pacing, RetryBudget, Termination, Worker};
use exn::ResultExt;
use pkgrepo_layout::{Layout, RepositoryPath, SigningKeys, SupportedRepos};
use pkgrepo_storage::ObjectStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// How long an idle background worker sleeps before checking again.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(5);
/// Workers used to catch up on every repository at startup.
pub const DEFAULT_BURST_WORKERS: usize = 20;
/// Attempts per repository in a bounded drain.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Outcome of [`SyncCoordinator::drain_bounded`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub regenerated: usize,
    /// Repositories that failed every attempt. They are dirty again.
    pub failed: Vec<RepositoryPath>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub idle_interval: Duration,
    /// Delay after a failed regeneration. Off by default: a failing
    /// repository is retried as soon as a worker pops it again.
    pub retry_backoff: Option<Duration>,
    pub burst_workers: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            idle_interval: DEFAULT_IDLE_INTERVAL,
            retry_backoff: None,
            burst_workers: DEFAULT_BURST_WORKERS,
        }
    }
}

/// Keeps repository metadata eventually consistent with the packages written
/// into the store.
///
/// Writers call [`mark_dirty`](Self::mark_dirty) after every successful
/// write; workers regenerate dirty repositories in the background. Every
/// `mark_dirty` is followed by at least one regeneration that starts after
/// it, but regeneration failures are never reported back to the writer.
///
/// Cloning is cheap and every clone shares the same dirty set.
#[derive(Clone)]
pub struct SyncCoordinator {
    dirty: Arc<DirtySet>,
    generator: GeneratorHandle,
    settings: SyncSettings,
}

impl SyncCoordinator {
    pub fn new(generator: GeneratorHandle) -> Self {
        Self::with_settings(generator, SyncSettings::default())
    }

    pub fn with_settings(generator: GeneratorHandle, settings: SyncSettings) -> Self {
        Self { dirty: Arc::new(DirtySet::default()), generator, settings }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Queues a repository for regeneration. Never blocks on I/O.
    pub fn mark_dirty(&self, repository: RepositoryPath) {
        let repository_name = repository.to_string();
        if self.dirty.insert(repository) {
            tracing::debug!(repository = %repository_name, "Marked repository dirty");
        } else {
            tracing::trace!(repository = %repository_name, "Repository already dirty");
        }
    }

    /// Number of repositories waiting for regeneration.
    pub fn pending(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_dirty(&self, repository: &str) -> bool {
        self.dirty.contains(repository)
    }

    fn worker(&self, id: usize, termination: Termination, budget: Option<&Arc<RetryBudget>>) -> Worker {
        Worker {
            id,
            dirty: Arc::clone(&self.dirty),
            generator: Arc::clone(&self.generator),
            pacing: Pacing {
                idle_interval: self.settings.idle_interval,
                retry_backoff: self.settings.retry_backoff,
            },
            termination,
            budget: budget.map(Arc::clone),
        }
    }

    /// Starts the long-lived worker. It runs until `cancel` is cancelled,
    /// finishing the regeneration in progress (if any) first.
    pub fn spawn_background(&self, cancel: CancellationToken) -> JoinHandle<usize> {
        tracing::info!(idle_interval = ?self.settings.idle_interval, "Starting background sync worker");
        tokio::spawn(self.worker(0, Termination::Forever, None).run(cancel))
    }

    /// Runs `workers` short-lived workers until the dirty set is empty and
    /// waits for all of them. Returns the number of successful regenerations.
    ///
    /// Failed repositories are requeued, so this only returns once every
    /// repository popped has been regenerated successfully.
    pub async fn drain(&self, workers: usize) -> Result<usize> {
        let workers = workers.max(1);
        tracing::info!(workers, pending = self.pending(), "Draining dirty repositories");
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        for id in 1..=workers {
            tasks.spawn(self.worker(id, Termination::WhenEmpty, None).run(cancel.clone()));
        }
        let mut regenerated = 0;
        while let Some(joined) = tasks.join_next().await {
            regenerated += joined.or_raise(|| ErrorKind::Worker)?;
        }
        Ok(regenerated)
    }

    /// Like [`drain`](Self::drain), but gives each repository at most
    /// `max_attempts` regenerations, so it returns even when a repository
    /// keeps failing. Repositories that ran out of attempts are reported and
    /// left in the dirty set.
    pub async fn drain_bounded(&self, workers: usize, max_attempts: usize) -> Result<DrainReport> {
        let workers = workers.max(1);
        tracing::info!(workers, max_attempts, pending = self.pending(), "Draining dirty repositories");
        let budget = Arc::new(RetryBudget::new(Arc::clone(&self.dirty), max_attempts));
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        for id in 1..=workers {
            tasks.spawn(self.worker(id, Termination::WhenEmpty, Some(&budget)).run(cancel.clone()));
        }
        let mut regenerated = 0;
        while let Some(joined) = tasks.join_next().await {
            regenerated += joined.or_raise(|| ErrorKind::Worker)?;
        }
        let failed = budget.exhausted();
        if !failed.is_empty() {
            let repositories: Vec<&str> = failed.iter().map(RepositoryPath::as_str).collect();
            tracing::warn!(?repositories, "Repositories still need regeneration");
        }
        Ok(DrainReport { regenerated, failed })
    }

    /// Marks every repository that exists in the store dirty and drains them
    /// with the burst workers.
    ///
    /// Meant to run once at startup, to catch up on writes whose
    /// regeneration never happened (a restart with a non-empty dirty set, for
    /// one). Runs alongside the background worker without coordinating with
    /// it beyond the shared dirty set.
    pub async fn startup_reconciliation(
        &self,
        store: &dyn ObjectStore,
        layout: &Layout,
        repos: &SupportedRepos,
        signing: &SigningKeys,
    ) -> Result<usize> {
        let scans = layout.scans(repos);
        let repositories = discover_all(store, &scans, signing, self.settings.burst_workers).await?;
        tracing::info!(store = store.name(), repositories = repositories.len(), "Reconciling all repositories");
        for repository in repositories {
            self.mark_dirty(repository);
        }
        self.drain(self.settings.burst_workers).await
    }
}
