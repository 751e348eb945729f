// src/config/mod.rs

//! Configuration loading, validation, and unit construction.
//!
//! Responsibilities:
//! - Define the YAML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate structural invariants (`validate.rs`).
//! - Instantiate units and the shared state store (`build.rs`).

pub mod build;
pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use build::build_units;
pub use loader::{load_and_validate, load_from_path};
pub use model::{
    BootConfig, CommonConfig, ConfigBlock, ConfigFile, CountConfig, CronConfig, EmailConfig,
    FileConfig, GitConfig, LogConfig, NtfyConfig, RebootConfig, RunConfig, StartConfig, UnitEntry,
};
pub use validate::validate_config;
