// src/units/mod.rs

//! Unit kinds and the contracts between them and the orchestrator.
//!
//! A unit is a named node in the automation graph. Trigger units (start,
//! boot, cron, file, git) expose a `check` that says whether their condition
//! holds; action units (run, log, count, email, ntfy, reboot) only run.
//! Every unit carries three reference lists (`on_success`, `on_failure`,
//! `always`) that the orchestrator expands after the unit finishes.

pub mod boot;
pub mod count;
pub mod cron;
pub mod email;
pub mod file;
pub mod git;
pub mod log;
pub mod ntfy;
pub mod reboot;
pub mod run;
pub mod start;

use std::fmt;

use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;

use crate::engine::capture::CaptureSink;

pub use boot::BootTrigger;
pub use count::CountUnit;
pub use cron::CronTrigger;
pub use email::EmailUnit;
pub use file::FileTrigger;
pub use git::GitTrigger;
pub use log::LogUnit;
pub use ntfy::NtfyUnit;
pub use reboot::RebootUnit;
pub use run::RunUnit;
pub use start::StartTrigger;

/// How a trigger unit's `check` is being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Called during the orchestrator's periodic polling sweep.
    Polling,
    /// Called because another unit's reference list named this one.
    Manual,
}

impl fmt::Display for CheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckMode::Polling => write!(f, "polling"),
            CheckMode::Manual => write!(f, "manual"),
        }
    }
}

/// The reference lists driving fan-out after a unit finishes.
#[derive(Debug, Clone, Default)]
pub struct UnitRefs {
    pub on_success: Vec<String>,
    pub on_failure: Vec<String>,
    pub always: Vec<String>,
}

impl UnitRefs {
    pub fn new(on_success: Vec<String>, on_failure: Vec<String>, always: Vec<String>) -> Self {
        Self {
            on_success,
            on_failure,
            always,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.on_success.is_empty() && self.on_failure.is_empty() && self.always.is_empty()
    }
}

impl From<&crate::config::CommonConfig> for UnitRefs {
    fn from(common: &crate::config::CommonConfig) -> Self {
        Self {
            on_success: common.on_success.clone(),
            on_failure: common.on_failure.clone(),
            always: common.always.clone(),
        }
    }
}

/// Per-edge context injected by the orchestrator before a downstream unit
/// runs: who triggered it, what that unit printed, and how it failed.
///
/// Units read the fields they care about; a sweep-root execution gets the
/// empty default.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Name of the unit whose fan-out reached this one.
    pub triggered_by: Option<String>,

    /// Propagated (ANSI-stripped) output of the triggering unit.
    pub output: Option<String>,

    /// Rendered error of the triggering unit, if it failed.
    pub error: Option<String>,
}

impl Invocation {
    /// The triggering unit's name, or `"unknown"` at the root of a sweep.
    pub fn triggering_unit(&self) -> &str {
        self.triggered_by.as_deref().unwrap_or("unknown")
    }

    /// The upstream output, if any non-empty capture was propagated.
    pub fn upstream_output(&self) -> Option<&str> {
        self.output.as_deref().filter(|s| !s.is_empty())
    }
}

/// A configured unit: one variant per kind.
///
/// The orchestrator owns a `Vec<Unit>` and dispatches through the methods
/// below; per-kind behaviour lives in the variant modules.
#[derive(Debug)]
pub enum Unit {
    Start(StartTrigger),
    Boot(BootTrigger),
    Cron(CronTrigger),
    File(FileTrigger),
    Git(GitTrigger),
    Run(RunUnit),
    Log(LogUnit),
    Count(CountUnit),
    Email(EmailUnit),
    Ntfy(NtfyUnit),
    Reboot(RebootUnit),
}

impl Unit {
    pub fn name(&self) -> &str {
        match self {
            Unit::Start(u) => &u.name,
            Unit::Boot(u) => &u.name,
            Unit::Cron(u) => &u.name,
            Unit::File(u) => &u.name,
            Unit::Git(u) => &u.name,
            Unit::Run(u) => &u.name,
            Unit::Log(u) => &u.name,
            Unit::Count(u) => &u.name,
            Unit::Email(u) => &u.name,
            Unit::Ntfy(u) => &u.name,
            Unit::Reboot(u) => &u.name,
        }
    }

    /// Stable type tag, e.g. `trigger.git` or `run`.
    pub fn kind(&self) -> &'static str {
        match self {
            Unit::Start(_) => "trigger.start",
            Unit::Boot(_) => "trigger.boot",
            Unit::Cron(_) => "trigger.cron",
            Unit::File(_) => "trigger.file",
            Unit::Git(_) => "trigger.git",
            Unit::Run(_) => "run",
            Unit::Log(_) => "log",
            Unit::Count(_) => "count",
            Unit::Email(_) => "email",
            Unit::Ntfy(_) => "ntfy",
            Unit::Reboot(_) => "reboot",
        }
    }

    pub fn refs(&self) -> &UnitRefs {
        match self {
            Unit::Start(u) => &u.refs,
            Unit::Boot(u) => &u.refs,
            Unit::Cron(u) => &u.refs,
            Unit::File(u) => &u.refs,
            Unit::Git(u) => &u.refs,
            Unit::Run(u) => &u.refs,
            Unit::Log(u) => &u.refs,
            Unit::Count(u) => &u.refs,
            Unit::Email(u) => &u.refs,
            Unit::Ntfy(u) => &u.refs,
            Unit::Reboot(u) => &u.refs,
        }
    }

    /// True for units that expose a `check` condition.
    pub fn is_trigger(&self) -> bool {
        matches!(
            self,
            Unit::Start(_) | Unit::Boot(_) | Unit::Cron(_) | Unit::File(_) | Unit::Git(_)
        )
    }

    /// True for triggers that only make sense on the startup sweep and are
    /// skipped by later polling sweeps.
    pub fn startup_only(&self) -> bool {
        matches!(self, Unit::Start(_) | Unit::Boot(_))
    }

    /// Evaluate a trigger unit's condition.
    ///
    /// Calling this on an action unit is a caller bug and returns an error.
    pub async fn check(&self, cancel: &CancellationToken, mode: CheckMode) -> Result<bool> {
        match self {
            Unit::Start(u) => u.check(mode),
            Unit::Boot(u) => u.check(mode),
            Unit::Cron(u) => u.check(mode),
            Unit::File(u) => u.check(mode),
            Unit::Git(u) => u.check(cancel, mode).await,
            other => bail!("unit '{}' is not a trigger", other.name()),
        }
    }

    /// Execute the unit. Output goes to `sink`; `inv` carries the context
    /// injected by the orchestrator for this edge.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        sink: &CaptureSink,
        inv: &Invocation,
    ) -> Result<()> {
        match self {
            Unit::Start(u) => u.run(sink),
            Unit::Boot(u) => u.run(sink),
            Unit::Cron(u) => u.run(sink),
            Unit::File(u) => u.run(sink),
            Unit::Git(u) => u.run(sink),
            Unit::Run(u) => u.run(cancel, sink).await,
            Unit::Log(u) => u.run(sink, inv),
            Unit::Count(u) => u.run(sink, inv),
            Unit::Email(u) => u.run(cancel, sink, inv).await,
            Unit::Ntfy(u) => u.run(cancel, sink, inv).await,
            Unit::Reboot(u) => u.run(cancel, sink).await,
        }
    }
}

/// Tail-truncate `output` to its last `limit` lines, prepending a
/// disclosure line when truncation happened.
///
/// Shared by the notification units (email, ntfy).
pub(crate) fn tail_lines(output: &str, limit: Option<usize>) -> String {
    let Some(limit) = limit.filter(|&n| n > 0) else {
        return output.to_string();
    };

    let lines: Vec<&str> = output.split('\n').collect();
    if lines.len() <= limit {
        return output.to_string();
    }

    let tail = lines[lines.len() - limit..].join("\n");
    format!(
        "(showing last {} of {} lines)\n{}",
        limit,
        lines.len(),
        tail
    )
}
