// src/config/build.rs

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::model::ConfigFile;
use crate::state::StateStore;
use crate::units::{
    BootTrigger, CountUnit, CronTrigger, EmailUnit, FileTrigger, GitTrigger, LogUnit, NtfyUnit,
    RebootUnit, RunUnit, StartTrigger, Unit,
};

/// Instantiate the configured units.
///
/// Opens (and loads) the shared state store, then constructs one unit per
/// entry. Construction is where kind-specific configuration is parsed
/// (cron schedules, durations, mail addresses, glob patterns), so a bad
/// config fails here, before anything runs.
pub fn build_units(cfg: &ConfigFile) -> Result<(Vec<Unit>, StateStore)> {
    let state = StateStore::open(&cfg.config.state_location)
        .with_context(|| format!("loading state from {:?}", cfg.config.state_location))?;

    let mut units = Vec::with_capacity(cfg.units.len());
    for entry in &cfg.units {
        if let Some(c) = &entry.start {
            units.push(Unit::Start(StartTrigger::from_config(c)));
        }
        if let Some(c) = &entry.boot {
            units.push(Unit::Boot(BootTrigger::from_config(c, state.clone())));
        }
        if let Some(c) = &entry.reboot {
            units.push(Unit::Reboot(RebootUnit::from_config(c)));
        }
        if let Some(c) = &entry.run {
            units.push(Unit::Run(RunUnit::from_config(c)?));
        }
        if let Some(c) = &entry.log {
            units.push(Unit::Log(LogUnit::from_config(c)));
        }
        if let Some(c) = &entry.count {
            units.push(Unit::Count(CountUnit::from_config(c, state.clone())));
        }
        if let Some(c) = &entry.cron {
            units.push(Unit::Cron(CronTrigger::from_config(c, state.clone())?));
        }
        if let Some(c) = &entry.file {
            units.push(Unit::File(FileTrigger::from_config(c, state.clone())?));
        }
        if let Some(c) = &entry.git {
            units.push(Unit::Git(GitTrigger::from_config(c, state.clone())?));
        }
        if let Some(c) = &entry.email {
            units.push(Unit::Email(EmailUnit::from_config(c)?));
        }
        if let Some(c) = &entry.ntfy {
            units.push(Unit::Ntfy(NtfyUnit::from_config(c)?));
        }
    }

    debug!(units = units.len(), "instantiated units from config");
    Ok((units, state))
}
