// src/config/mod.rs

//! Task catalog loading and validation.
//!
//! - [`model`] is the TOML-backed data model.
//! - [`loader`] reads a catalog from disk, strictly or fail-soft.
//! - [`validate`] checks dependency references, cycles and program ids.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_empty};
pub use model::{ActuatorSettings, Catalog, DispatcherSettings, RawCatalog, TaskConfig};
pub use validate::validate_raw_catalog;
