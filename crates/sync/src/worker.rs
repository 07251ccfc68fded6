use crate::dirty::DirtySet;
use crate::generator::GeneratorHandle;
use pkgrepo_layout::RepositoryPath;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a worker does once there is nothing left to regenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Sleep for the idle interval and check again, until cancelled.
    Forever,
    /// Stop.
    WhenEmpty,
}

/// Timing shared by every worker of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pacing {
    pub(crate) idle_interval: Duration,
    pub(crate) retry_backoff: Option<Duration>,
}

/// Per-repository attempt limit shared by the workers of one bounded drain.
///
/// Repositories that run out of attempts are set aside rather than requeued,
/// so the drain can finish. They go back into the dirty set when the budget
/// is dropped, which happens once the drain is over or abandoned.
#[derive(Debug)]
pub(crate) struct RetryBudget {
    dirty: Arc<DirtySet>,
    max_attempts: usize,
    attempts: Mutex<HashMap<RepositoryPath, usize>>,
    exhausted: Mutex<Vec<RepositoryPath>>,
}

impl RetryBudget {
    pub(crate) fn new(dirty: Arc<DirtySet>, max_attempts: usize) -> Self {
        Self {
            dirty,
            max_attempts: max_attempts.max(1),
            attempts: Mutex::default(),
            exhausted: Mutex::default(),
        }
    }

    /// Counts a failed attempt. Returns `false` once the repository has used
    /// up its attempts, in which case it has been set aside.
    fn retry(&self, repository: &RepositoryPath) -> bool {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let used = attempts.entry(repository.clone()).or_default();
        *used += 1;
        if *used < self.max_attempts {
            return true;
        }
        self.exhausted.lock().unwrap_or_else(PoisonError::into_inner).push(repository.clone());
        false
    }

    pub(crate) fn exhausted(&self) -> Vec<RepositoryPath> {
        self.exhausted.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Drop for RetryBudget {
    fn drop(&mut self) {
        let exhausted = self.exhausted.get_mut().unwrap_or_else(PoisonError::into_inner);
        for repository in exhausted.drain(..) {
            self.dirty.insert(repository);
        }
    }
}

/// A popped repository. Unless settled, dropping it puts the repository
/// back into the dirty set, including when the worker's task is aborted
/// mid-regeneration.
struct InFlight<'a> {
    dirty: &'a DirtySet,
    repository: RepositoryPath,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.dirty.insert(self.repository.clone());
        }
    }
}

/// Pops repositories off the dirty set and regenerates them, one at a time.
///
/// A repository is removed from the set before its regeneration starts, so no
/// two workers ever regenerate the same repository at once. Failed
/// repositories go back into the set to be retried by whichever worker pops
/// them next.
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) dirty: Arc<DirtySet>,
    pub(crate) generator: GeneratorHandle,
    pub(crate) pacing: Pacing,
    pub(crate) termination: Termination,
    /// Unbounded retries when unset.
    pub(crate) budget: Option<Arc<RetryBudget>>,
}

impl Worker {
    /// Returns the number of successful regenerations.
    pub(crate) async fn run(self, cancel: CancellationToken) -> usize {
        tracing::debug!(worker = self.id, termination = ?self.termination, "Sync worker started");
        let mut regenerated = 0;
        while !cancel.is_cancelled() {
            let Some(repository) = self.dirty.pop() else {
                match self.termination {
                    Termination::WhenEmpty => break,
                    Termination::Forever => {
                        Self::pause(&cancel, self.pacing.idle_interval).await;
                        continue;
                    },
                }
            };
            let mut in_flight = InFlight { dirty: &self.dirty, repository, settled: false };
            let repository = &in_flight.repository;
            match self.generator.regenerate(repository).await {
                Ok(()) => {
                    regenerated += 1;
                    tracing::info!(worker = self.id, repository = %repository, "Regenerated repository metadata");
                    in_flight.settled = true;
                },
                Err(err) => {
                    match &self.budget {
                        Some(budget) if !budget.retry(repository) => {
                            tracing::error!(worker = self.id, repository = %repository, error = ?err, "Metadata regeneration failed; giving up for now");
                            in_flight.settled = true;
                        },
                        _ => {
                            tracing::warn!(worker = self.id, repository = %repository, error = ?err, "Metadata regeneration failed; requeued");
                        },
                    }
                    drop(in_flight);
                    match self.pacing.retry_backoff {
                        Some(backoff) => Self::pause(&cancel, backoff).await,
                        None => tokio::task::yield_now().await,
                    }
                },
            }
        }
        tracing::debug!(worker = self.id, regenerated, "Sync worker stopped");
        regenerated
    }

    async fn pause(cancel: &CancellationToken, duration: Duration) {
        tokio::select! {
            () = cancel.cancelled() => {},
            () = tokio::time::sleep(duration) => {},
        }
    }
}
