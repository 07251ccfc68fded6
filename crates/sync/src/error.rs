//! Errors from metadata regeneration and repository discovery.
//!
//! Regeneration failures never reach the writer that dirtied a repository;
//! workers log them and requeue the repository.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The metadata generator executable is not installed.
    #[display("metadata generator not found: {_0}")]
    GeneratorNotFound(#[error(not(source))] String),
    /// The metadata generator could not be started.
    #[display("failed to launch metadata generator for {_0}")]
    Launch(#[error(not(source))] String),
    /// The metadata generator ran, but reported failure.
    #[display("metadata generation failed for {repository}: {status}")]
    Generation { repository: String, status: String },
    /// Listing the store to find existing repositories failed.
    #[display("repository discovery failed under {_0}")]
    Discovery(#[error(not(source))] String),
    /// A worker task panicked or was aborted.
    #[display("sync worker failed")]
    Worker,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Launch(_) | Self::Generation { .. } | Self::Discovery(_))
    }
}
