// src/config/validate.rs

use std::collections::HashSet;

use anyhow::{anyhow, Result};
use tracing::warn;

use crate::config::model::{CommonConfig, ConfigFile, UnitEntry};

/// Run basic semantic validation against a loaded configuration.
///
/// This checks:
/// - the state file location is set
/// - there is at least one unit
/// - every entry carries exactly one unit kind
/// - every unit has a name, and names are unique
/// - kind-specific required fields are non-empty
///
/// Reference lists pointing at unknown unit names only *warn* here: the
/// orchestrator skips unknown targets at fan-out time with a diagnostic, so
/// a half-edited config still runs.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    if cfg.config.state_location.as_os_str().is_empty() {
        return Err(anyhow!("config.state_location is required"));
    }

    if cfg.units.is_empty() {
        return Err(anyhow!("config must contain at least one unit"));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for (i, entry) in cfg.units.iter().enumerate() {
        let kinds = entry.kinds();
        if kinds.len() != 1 {
            return Err(anyhow!(
                "unit {}: expected exactly one kind per entry, found {:?}",
                i,
                kinds
            ));
        }

        let common = common_of(entry);
        if common.name.is_empty() {
            return Err(anyhow!("unit {} ({}): name is required", i, kinds[0]));
        }
        if !seen.insert(common.name.as_str()) {
            return Err(anyhow!(
                "unit {} ({}): duplicate unit name '{}'",
                i,
                kinds[0],
                common.name
            ));
        }

        validate_required_fields(i, entry)?;
    }

    warn_unknown_references(cfg);
    Ok(())
}

fn validate_required_fields(i: usize, entry: &UnitEntry) -> Result<()> {
    if let Some(run) = &entry.run {
        if run.script.is_empty() {
            return Err(anyhow!("unit {} ({}): script is required", i, run.common.name));
        }
    }
    if let Some(log) = &entry.log {
        if log.file.as_os_str().is_empty() {
            return Err(anyhow!("unit {} ({}): file is required", i, log.common.name));
        }
    }
    if let Some(cron) = &entry.cron {
        if cron.schedule.is_empty() {
            return Err(anyhow!(
                "unit {} ({}): schedule is required",
                i,
                cron.common.name
            ));
        }
    }
    if let Some(file) = &entry.file {
        if file.pattern.is_empty() {
            return Err(anyhow!(
                "unit {} ({}): pattern is required",
                i,
                file.common.name
            ));
        }
    }
    if let Some(git) = &entry.git {
        if git.repository.as_os_str().is_empty() {
            return Err(anyhow!(
                "unit {} ({}): repository is required",
                i,
                git.common.name
            ));
        }
        if git.branch.is_empty() {
            return Err(anyhow!("unit {} ({}): branch is required", i, git.common.name));
        }
    }
    if let Some(email) = &entry.email {
        if email.smtp_host.is_empty() {
            return Err(anyhow!(
                "unit {} ({}): smtp_host is required",
                i,
                email.common.name
            ));
        }
        if email.to.is_empty() {
            return Err(anyhow!("unit {} ({}): to is required", i, email.common.name));
        }
    }
    if let Some(ntfy) = &entry.ntfy {
        if ntfy.topic.is_empty() {
            return Err(anyhow!("unit {} ({}): topic is required", i, ntfy.common.name));
        }
    }
    Ok(())
}

fn warn_unknown_references(cfg: &ConfigFile) {
    let names: HashSet<&str> = cfg
        .units
        .iter()
        .map(|e| common_of(e).name.as_str())
        .collect();

    for entry in &cfg.units {
        let common = common_of(entry);
        for target in common
            .on_success
            .iter()
            .chain(&common.on_failure)
            .chain(&common.always)
        {
            if !names.contains(target.as_str()) {
                warn!(
                    unit = %common.name,
                    target = %target,
                    "reference to unknown unit; it will be skipped at run time"
                );
            }
        }
    }
}

fn common_of(entry: &UnitEntry) -> &CommonConfig {
    static EMPTY: std::sync::OnceLock<CommonConfig> = std::sync::OnceLock::new();

    if let Some(c) = &entry.start {
        return &c.common;
    }
    if let Some(c) = &entry.boot {
        return &c.common;
    }
    if let Some(c) = &entry.reboot {
        return &c.common;
    }
    if let Some(c) = &entry.run {
        return &c.common;
    }
    if let Some(c) = &entry.log {
        return &c.common;
    }
    if let Some(c) = &entry.count {
        return &c.common;
    }
    if let Some(c) = &entry.cron {
        return &c.common;
    }
    if let Some(c) = &entry.file {
        return &c.common;
    }
    if let Some(c) = &entry.git {
        return &c.common;
    }
    if let Some(c) = &entry.email {
        return &c.common;
    }
    if let Some(c) = &entry.ntfy {
        return &c.common;
    }

    EMPTY.get_or_init(CommonConfig::default)
}
