// src/units/start.rs

//! Start trigger: fires unconditionally on every sweep it takes part in.

use anyhow::Result;

use crate::config::StartConfig;
use crate::engine::capture::CaptureSink;
use crate::units::{CheckMode, UnitRefs};

/// Trigger that always fires when trigrun starts.
///
/// Because the kind is startup-only, polling sweeps after the first skip it,
/// so in practice it fires exactly once per process.
#[derive(Debug)]
pub struct StartTrigger {
    pub name: String,
    pub refs: UnitRefs,
}

impl StartTrigger {
    pub fn new(name: impl Into<String>, refs: UnitRefs) -> Self {
        Self {
            name: name.into(),
            refs,
        }
    }

    pub fn from_config(cfg: &StartConfig) -> Self {
        Self::new(cfg.common.name.clone(), UnitRefs::from(&cfg.common))
    }

    /// Start always triggers, regardless of mode.
    pub fn check(&self, _mode: CheckMode) -> Result<bool> {
        Ok(true)
    }

    pub fn run(&self, sink: &CaptureSink) -> Result<()> {
        sink.line(&format!("Start trigger '{}' activated", self.name));
        Ok(())
    }
}
