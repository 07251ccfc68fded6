//! Publisher errors.

use derive_more::{Display, Error};
use pkgrepo_layout::error::{Error as LayoutError, ErrorKind as LayoutErrorKind};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Split by [`is_client_error`](ErrorKind::is_client_error) into caller
/// mistakes and failures on the service side.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request path or one of its files was rejected.
    #[display("rejected request: {_0}")]
    Request(LayoutErrorKind),
    /// Reading from or writing to the store failed.
    #[display("store operation failed: {_0}")]
    Storage(#[error(not(source))] String),
    /// An explicit update named repositories that do not exist in the store.
    #[display("repository not found: {_0}")]
    RepositoryNotFound(#[error(not(source))] String),
    /// A local package file could not be read.
    #[display("failed to read {_0}")]
    Input(#[error(not(source))] String),
    /// Metadata regeneration could not be scheduled or run.
    #[display("metadata sync failed")]
    Sync,
    /// Configuration was missing or invalid.
    #[display("configuration error")]
    Config,
    /// A service the publisher depends on could not be set up.
    #[display("failed to set up {_0}")]
    Setup(#[error(not(source))] String),
}

impl ErrorKind {
    /// Convert a layout error into a publisher error, preserving the layout
    /// crate's `Exn` frame as a child in its own error tree.
    #[track_caller]
    pub fn request(err: LayoutError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Request(inner))
    }

    /// Returns `true` if the caller sent something that can never succeed,
    /// as opposed to a failure on the service side.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Request(kind) => kind.is_client_error(),
            Self::RepositoryNotFound(_) | Self::Input(_) => true,
            Self::Storage(_) | Self::Sync | Self::Config | Self::Setup(_) => false,
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Sync)
    }
}
