//! Layout Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A layout error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for layout operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant except [`UnsupportedRepositoryFamily`](Self::UnsupportedRepositoryFamily)
/// is caused by the request itself: report it back to the caller and don't
/// retry.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Path could not be split into `kind/series/distro/version`, or escapes
    /// the store root.
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    #[display("unsupported repository kind: {_0}")]
    UnsupportedKind(#[error(not(source))] String),
    #[display("unsupported series: {_0}")]
    UnsupportedSeries(#[error(not(source))] String),
    #[display("unsupported distribution: {_0}")]
    UnsupportedDistro(#[error(not(source))] String),
    #[display("unsupported distribution version: {_0}")]
    UnsupportedVersion(#[error(not(source))] String),
    /// The file does not match the type of files used by the repository family.
    #[display("invalid artifact: {_0}")]
    InvalidArtifact(#[error(not(source))] String),
    /// Deb repositories place files by product name, so one must be given.
    #[display("product is required to place files in deb-based repositories")]
    MissingProduct,
    /// Configuration fault; must be rejected when the descriptor is loaded.
    #[display("unsupported repository family: {_0}")]
    UnsupportedRepositoryFamily(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Returns `true` if the error was caused by the request rather than by
    /// the service configuration.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::UnsupportedRepositoryFamily(_))
    }
}
