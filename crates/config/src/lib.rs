//! Configuration loading and validation.
//!
//! Configuration is layered: built-in defaults, then a TOML, YAML or JSON
//! file, then `PKGREPO_*` environment variables. [`Config`] is the raw,
//! deserialized form; its accessors validate it into the descriptor, layout,
//! signing keys and store details used by the rest of the workspace, so
//! configuration faults surface at startup rather than per request.

pub mod error;
mod load;
mod settings;

pub use crate::load::{ENV_PREFIX, default_path};
pub use crate::settings::{
    Config, DistroConfig, ReposConfig, SigningConfig, Store, StoreBackend, StoreConfig, SyncConfig,
};
