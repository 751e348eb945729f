// src/units/reboot.rs

//! Reboot unit: reboot the machine, optionally after a delay.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::RebootConfig;
use crate::engine::capture::CaptureSink;
use crate::units::UnitRefs;

/// Action unit that invokes the system `reboot` command.
#[derive(Debug)]
pub struct RebootUnit {
    pub name: String,
    pub refs: UnitRefs,
    delay_secs: u64,
}

impl RebootUnit {
    pub fn new(name: impl Into<String>, delay_secs: u64, refs: UnitRefs) -> Self {
        Self {
            name: name.into(),
            refs,
            delay_secs,
        }
    }

    pub fn from_config(cfg: &RebootConfig) -> Self {
        Self::new(cfg.common.name.clone(), cfg.delay, UnitRefs::from(&cfg.common))
    }

    pub async fn run(&self, cancel: &CancellationToken, sink: &CaptureSink) -> Result<()> {
        sink.line(&format!("Reboot unit '{}' executing", self.name));

        if self.delay_secs > 0 {
            sink.line(&format!("Rebooting in {} seconds...", self.delay_secs));
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(self.delay_secs)) => {}
                _ = cancel.cancelled() => bail!("reboot cancelled during delay"),
            }
        } else {
            sink.line("Rebooting now...");
        }

        let status = Command::new("reboot")
            .status()
            .await
            .context("failed to execute reboot")?;
        if !status.success() {
            bail!("reboot exited with code {}", status.code().unwrap_or(-1));
        }

        Ok(())
    }
}
