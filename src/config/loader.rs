// src/config/loader.rs

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;

/// Load a configuration file from a given path and return the raw
/// `ConfigFile`.
///
/// This only performs YAML deserialization; it does **not** perform semantic
/// validation (unit names, kinds, etc.). Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading config file at {:?}", path))?;

    let config: ConfigFile = serde_yaml::from_str(&contents)
        .with_context(|| format!("parsing YAML config from {:?}", path))?;

    Ok(config)
}

/// Load a configuration file from path and run basic validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads YAML.
/// - Applies defaults (handled by `serde` + default functions).
/// - Checks unit entries are well-formed (one kind each, named, unique,
///   required fields present).
///
/// Unit *instantiation* (cron parsing, duration parsing, address parsing)
/// happens in [`crate::config::build_units`], which reports its own errors.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}
