use pkgrepo_layout::RepositoryPath;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Repositories waiting for their metadata to be regenerated.
///
/// Inserting a repository that is already waiting is a no-op, so any number
/// of writes to one repository between two regenerations cost a single
/// regeneration. Every operation holds the lock for O(1) work only, and never
/// across an `.await`.
#[derive(Debug, Default)]
pub struct DirtySet {
    inner: Mutex<HashSet<RepositoryPath>>,
}

impl DirtySet {
    fn lock(&self) -> MutexGuard<'_, HashSet<RepositoryPath>> {
        // The set is always left consistent, so a panic elsewhere while
        // holding the lock doesn't invalidate it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if the repository was not already waiting.
    pub fn insert(&self, repository: RepositoryPath) -> bool {
        self.lock().insert(repository)
    }

    /// Removes and returns an arbitrary waiting repository.
    pub fn pop(&self) -> Option<RepositoryPath> {
        let mut guard = self.lock();
        let next = guard.iter().next().cloned()?;
        guard.take(next.as_str())
    }

    pub fn contains(&self, repository: &str) -> bool {
        self.lock().contains(repository)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
