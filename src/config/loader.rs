// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::{error, info};

use crate::config::model::{Catalog, RawCatalog};
use crate::errors::Result;

/// Load a catalog file from a given path and return the raw `RawCatalog`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawCatalog> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let catalog: RawCatalog = toml::from_str(&contents)?;

    Ok(catalog)
}

/// Load a catalog from path and validate it:
///
/// - at least one task,
/// - no unknown or self references in `after`,
/// - no dependency cycles,
/// - unique program ids.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Catalog> {
    let raw = load_from_path(&path)?;
    let catalog = Catalog::try_from(raw)?;
    Ok(catalog)
}

/// Load a catalog, degrading to an empty one on any error.
///
/// An unreadable or malformed catalog means "no constraints": the
/// dispatcher keeps running with an empty dependency map.
pub fn load_or_empty(path: impl AsRef<Path>) -> Catalog {
    let path = path.as_ref();
    match load_and_validate(path) {
        Ok(catalog) => {
            info!(
                path = %path.display(),
                tasks = catalog.task.len(),
                "loaded task catalog"
            );
            catalog
        }
        Err(err) => {
            error!(
                path = %path.display(),
                error = %err,
                "failed to load task catalog; continuing with no dependency constraints"
            );
            Catalog::empty()
        }
    }
}

