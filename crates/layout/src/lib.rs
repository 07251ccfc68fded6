//! Where packages go.
//!
//! A repository is addressed by a [`RepositoryCoordinate`]
//! (`kind/series/distro/version`) validated against the [`SupportedRepos`]
//! descriptor. Request paths may use anchors that expand into several
//! coordinates ([`expand`]), and the [`Layout`] maps a package filename and a
//! coordinate onto the physical repositories and object keys it is written
//! to.

mod coordinate;
mod descriptor;
pub mod error;
mod pathspec;
mod placement;
mod repository;
mod signing;

pub use crate::coordinate::RepositoryCoordinate;
pub use crate::descriptor::{Distro, Family, SupportedRepos};
pub use crate::pathspec::{Anchors, PathSpec, SEGMENTS, Segment, expand};
pub use crate::placement::{DEFAULT_ARCHITECTURES, Layout, Placement, Scan, ScanMode};
pub use crate::repository::{RepositoryPath, normalize};
pub use crate::signing::SigningKeys;
