// src/units/cron.rs

//! Cron trigger: fires when a five-field cron schedule comes due.
//!
//! The fire decision is anchored to the *scheduled* instant, not the wall
//! clock at which the sweep happened to run: the scheduled minute boundary
//! is what gets persisted, so re-entering the same minute on the next
//! 10-second sweep cannot fire twice. Runs missed by more than the
//! tolerance window are skipped, not caught up.

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, SecondsFormat};
use cron::Schedule;
use tracing::{debug, warn};

use crate::config::CronConfig;
use crate::engine::capture::CaptureSink;
use crate::state::StateStore;
use crate::units::{CheckMode, UnitRefs};

const LAST_EXECUTION_KEY: &str = "last_execution";

/// How far past its scheduled instant a run may still fire. Anything later
/// counts as missed and is skipped.
const CATCH_UP_TOLERANCE_SECS: i64 = 60;

/// Trigger that fires on a cron schedule.
#[derive(Debug)]
pub struct CronTrigger {
    pub name: String,
    pub refs: UnitRefs,
    state: StateStore,
    schedule: Schedule,
    schedule_str: String,
}

impl CronTrigger {
    pub fn new(
        name: impl Into<String>,
        schedule: &str,
        state: StateStore,
        refs: UnitRefs,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            refs,
            state,
            schedule: parse_schedule(schedule)?,
            schedule_str: schedule.to_string(),
        })
    }

    pub fn from_config(cfg: &CronConfig, state: StateStore) -> Result<Self> {
        Self::new(
            cfg.common.name.clone(),
            &cfg.schedule,
            state,
            UnitRefs::from(&cfg.common),
        )
    }

    /// Returns true if the schedule has come due since the last recorded
    /// execution. Both modes behave identically.
    pub fn check(&self, _mode: CheckMode) -> Result<bool> {
        self.check_at(Local::now())
    }

    /// The fire decision at an explicit `now`, for deterministic tests.
    pub fn check_at(&self, now: DateTime<Local>) -> Result<bool> {
        let last = self
            .state
            .get_string(&self.name, LAST_EXECUTION_KEY)
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Local));

        let Some(last) = last else {
            // No execution recorded yet. Look back one minute so a schedule
            // matching the current minute still fires on first run.
            let Some(next) = self
                .schedule
                .after(&(now - ChronoDuration::minutes(1)))
                .next()
            else {
                return Ok(false);
            };

            if next <= now {
                self.record(next)?;
                return Ok(true);
            }
            return Ok(false);
        };

        let Some(scheduled) = self.schedule.after(&last).next() else {
            return Ok(false);
        };

        if scheduled > now {
            return Ok(false);
        }

        if now - scheduled > ChronoDuration::seconds(CATCH_UP_TOLERANCE_SECS) {
            warn!(
                unit = %self.name,
                scheduled = %scheduled.to_rfc3339_opts(SecondsFormat::Secs, true),
                "scheduled run missed by more than {}s; skipping",
                CATCH_UP_TOLERANCE_SECS
            );
            self.record(now)?;
            return Ok(false);
        }

        debug!(
            unit = %self.name,
            scheduled = %scheduled.to_rfc3339_opts(SecondsFormat::Secs, true),
            "cron schedule due"
        );
        self.record(scheduled)?;
        Ok(true)
    }

    pub fn run(&self, sink: &CaptureSink) -> Result<()> {
        sink.line(&format!(
            "Cron trigger '{}' activated (schedule: {})",
            self.name, self.schedule_str
        ));
        Ok(())
    }

    fn record(&self, instant: DateTime<Local>) -> Result<()> {
        self.state
            .set_string(
                &self.name,
                LAST_EXECUTION_KEY,
                &instant.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .context("saving execution time")
    }
}

/// Parse a cron expression in the classic five-field form
/// (minute hour day-of-month month day-of-week) or a `@descriptor`.
///
/// The `cron` crate wants a leading seconds field, so five-field
/// expressions are normalised by pinning seconds to zero.
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    let expr = expr.trim();
    let normalized = if !expr.starts_with('@') && expr.split_whitespace().count() == 5 {
        format!("0 {}", expr)
    } else {
        expr.to_string()
    };

    Schedule::from_str(&normalized)
        .map_err(|e| anyhow!("failed to parse cron schedule '{}': {}", expr, e))
}
