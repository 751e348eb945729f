// src/errors.rs

//! Crate-wide error types.
//!
//! Most of the engine and all units use `anyhow` directly; this enum covers
//! the few places where callers need to distinguish the failure kind (config
//! loading, unit lookup, daemon shutdown).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Returned by the daemon loop when the cancellation token fires.
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, EngineError>;
