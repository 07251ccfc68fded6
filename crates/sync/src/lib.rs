//! Keeping repository metadata fresh.
//!
//! Writers mark the repositories they touched as dirty on a
//! [`SyncCoordinator`]; its workers pop dirty repositories and hand them to a
//! [`MetadataGenerator`] (in production, [`Mkrepo`]). At startup,
//! [`SyncCoordinator::startup_reconciliation`] regenerates everything that
//! exists in the store.

mod coordinator;
mod dirty;
mod discover;
pub mod error;
mod generator;
mod worker;

pub use crate::coordinator::{
    DEFAULT_BURST_WORKERS, DEFAULT_IDLE_INTERVAL, DEFAULT_MAX_ATTEMPTS, DrainReport, SyncCoordinator, SyncSettings,
};
pub use crate::dirty::DirtySet;
pub use crate::discover::{discover, discover_all};
pub use crate::generator::{DebRelease, GeneratorHandle, MetadataGenerator, Mkrepo, S3Target, Target};
pub use crate::worker::Termination;
