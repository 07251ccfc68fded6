//! Errors raised by object store backends.

use derive_more::{Display, Error};
use std::io::Error as IoError;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Store failures, grouped by what a publisher can do about them.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No object at this key.
    #[display("object not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The store refused the credentials or the bucket policy forbids it.
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Could not reach the store, or the request timed out.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Empty, escapes the store root, or contains a null byte.
    #[display("invalid key: {_0}")]
    InvalidKey(#[error(not(source))] String),
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}

impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Transient failures; a later attempt at the same write may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::BackendError(_))
    }
}
