// src/units/boot.rs

//! Boot trigger: fires on the first run after an OS boot.
//!
//! The kernel boot instant is derived from `/proc/uptime` (first field is
//! the uptime in seconds; boot time = now - uptime). Successive reads of
//! the same boot can differ by a little, so instants within 10 seconds of
//! each other count as the same boot.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use tracing::debug;

use crate::config::BootConfig;
use crate::engine::capture::CaptureSink;
use crate::state::StateStore;
use crate::units::{CheckMode, UnitRefs};

const LAST_BOOT_TIME_KEY: &str = "last_boot_time";
const BOOT_COUNT_KEY: &str = "boot_count";

/// Tolerance on boot-instant equality, absorbing uptime measurement jitter.
const BOOT_TOLERANCE_SECS: i64 = 10;

/// Trigger that fires once per OS boot.
#[derive(Debug)]
pub struct BootTrigger {
    pub name: String,
    pub refs: UnitRefs,
    state: StateStore,
}

impl BootTrigger {
    pub fn new(name: impl Into<String>, state: StateStore, refs: UnitRefs) -> Self {
        Self {
            name: name.into(),
            refs,
            state,
        }
    }

    pub fn from_config(cfg: &BootConfig, state: StateStore) -> Self {
        Self::new(cfg.common.name.clone(), state, UnitRefs::from(&cfg.common))
    }

    /// Returns true if the system has booted since the last persisted boot
    /// instant (or there is none). Both modes behave identically.
    pub fn check(&self, _mode: CheckMode) -> Result<bool> {
        let current = boot_time()?;

        let last = self
            .state
            .get_string(&self.name, LAST_BOOT_TIME_KEY)
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc));

        let Some(last) = last else {
            // First run ever (or unreadable instant in state).
            self.record_boot(current, 1)?;
            return Ok(true);
        };

        let diff = (current - last).abs();
        if diff <= ChronoDuration::seconds(BOOT_TOLERANCE_SECS) {
            debug!(unit = %self.name, "boot instant unchanged");
            return Ok(false);
        }

        let count = self.state.get_i64(&self.name, BOOT_COUNT_KEY).unwrap_or(0) + 1;
        self.record_boot(current, count)?;
        Ok(true)
    }

    pub fn run(&self, sink: &CaptureSink) -> Result<()> {
        let count = self.state.get_i64(&self.name, BOOT_COUNT_KEY).unwrap_or(1);
        sink.line(&format!(
            "Boot trigger '{}' activated (boot count: {})",
            self.name, count
        ));
        Ok(())
    }

    fn record_boot(&self, instant: DateTime<Utc>, count: i64) -> Result<()> {
        self.state
            .set_string(
                &self.name,
                LAST_BOOT_TIME_KEY,
                &instant.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .context("saving boot time")?;
        self.state
            .set_i64(&self.name, BOOT_COUNT_KEY, count)
            .context("saving boot count")?;
        Ok(())
    }
}

/// The kernel boot instant, from `/proc/uptime`.
pub fn boot_time() -> Result<DateTime<Utc>> {
    let contents =
        std::fs::read_to_string("/proc/uptime").context("reading /proc/uptime")?;
    boot_time_from_uptime(&contents, Utc::now())
}

fn boot_time_from_uptime(uptime: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let first = uptime
        .split_whitespace()
        .next()
        .context("empty /proc/uptime")?;
    let secs: f64 = first
        .parse()
        .with_context(|| format!("parsing uptime value '{}'", first))?;

    Ok(now - ChronoDuration::milliseconds((secs * 1000.0) as i64))
}
