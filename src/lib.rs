//! Publishing OS packages into object-store backed repositories.
//!
//! A request names a repository coordinate path (`kind/series/distro/version`,
//! optionally with anchors standing in for several values of a segment) and a
//! set of package files. The [`Publisher`] resolves where each file belongs,
//! writes it into the store, and marks every repository it touched dirty so
//! the [`SyncCoordinator`](pkgrepo_sync::SyncCoordinator) regenerates its
//! metadata in the background.
//!
//! The building blocks live in their own crates:
//!
//! - `pkgrepo-layout`: coordinates, anchors and placement rules.
//! - `pkgrepo-storage`: the object store abstraction and its backends.
//! - `pkgrepo-sync`: the dirty set, workers and metadata generator adapter.
//! - `pkgrepo-config`: layered configuration.

mod classify;
pub mod error;
mod publish;

pub use crate::classify::{PathKind, classify};
pub use crate::publish::{Publisher, Upload, UploadReport};
