// src/units/count.rs

//! Count unit: tally how many times each upstream unit has reached this one.

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::CountConfig;
use crate::engine::capture::CaptureSink;
use crate::state::StateStore;
use crate::units::{Invocation, UnitRefs};

/// Action unit keeping one counter per triggering unit in the state store.
#[derive(Debug)]
pub struct CountUnit {
    pub name: String,
    pub refs: UnitRefs,
    state: StateStore,
}

impl CountUnit {
    pub fn new(name: impl Into<String>, state: StateStore, refs: UnitRefs) -> Self {
        Self {
            name: name.into(),
            refs,
            state,
        }
    }

    pub fn from_config(cfg: &CountConfig, state: StateStore) -> Self {
        Self::new(cfg.common.name.clone(), state, UnitRefs::from(&cfg.common))
    }

    pub fn run(&self, sink: &CaptureSink, inv: &Invocation) -> Result<()> {
        let unit = inv.triggering_unit();

        let count = self.state.get_i64(&self.name, unit).unwrap_or(0) + 1;
        self.state
            .set_i64(&self.name, unit, count)
            .context("saving count")?;

        debug!(unit = %self.name, triggered_by = %unit, count, "count updated");
        sink.line(&format!(
            "Count unit '{}': unit '{}' has triggered {} time(s)",
            self.name, unit, count
        ));
        Ok(())
    }
}
