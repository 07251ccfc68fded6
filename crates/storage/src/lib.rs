pub mod backend;
pub mod error;
mod key;

pub use crate::backend::{Listing, ObjectStore};
pub use crate::key::{validate as validate_key, validate_prefix};
use std::sync::Arc;

pub type StoreHandle = Arc<dyn ObjectStore + Send + Sync>;
