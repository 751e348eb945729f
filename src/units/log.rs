// src/units/log.rs

//! Log unit: append the triggering unit's captured output to a file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, SecondsFormat};
use tracing::debug;

use crate::config::LogConfig;
use crate::engine::capture::CaptureSink;
use crate::units::{Invocation, UnitRefs};

/// Action unit that appends upstream output to a log file.
#[derive(Debug)]
pub struct LogUnit {
    pub name: String,
    pub refs: UnitRefs,
    file: PathBuf,
}

impl LogUnit {
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>, refs: UnitRefs) -> Self {
        Self {
            name: name.into(),
            refs,
            file: file.into(),
        }
    }

    pub fn from_config(cfg: &LogConfig) -> Self {
        Self::new(
            cfg.common.name.clone(),
            cfg.file.clone(),
            UnitRefs::from(&cfg.common),
        )
    }

    pub fn run(&self, _sink: &CaptureSink, inv: &Invocation) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory at {:?}", parent))?;
            }
        }

        let mut opts = OpenOptions::new();
        opts.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o644);
        }
        let mut file = opts
            .open(&self.file)
            .with_context(|| format!("opening log file at {:?}", self.file))?;

        let timestamp = Local::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let unit = inv.triggering_unit();

        let entry = match inv.upstream_output() {
            Some(output) => format!("=== Unit '{}' - {} ===\n{}\n", unit, timestamp, output),
            None => format!("=== Unit '{}' - {} (no output) ===\n", unit, timestamp),
        };

        file.write_all(entry.as_bytes())
            .with_context(|| format!("writing to log file at {:?}", self.file))?;

        debug!(unit = %self.name, file = ?self.file, "log entry written");
        Ok(())
    }
}
