// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DuodagError {
    #[error("Catalog error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in task dependencies: {0}")]
    DagCycle(String),

    #[error("Invalid track assignment: {0}")]
    AssignmentError(String),

    #[error("Actuator error: {0}")]
    ActuatorError(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DuodagError>;
