// src/engine/orchestrator.rs

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::capture::CaptureSink;
use crate::errors::EngineError;
use crate::units::{CheckMode, Invocation, Unit};

/// Interval between polling sweeps in daemon mode.
const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Result of one unit execution within a sweep.
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub name: String,
    pub kind: &'static str,
    /// Rendered error chain; `None` on success.
    pub error: Option<String>,
    /// Captured stdout+stderr with ANSI sequences stripped.
    pub output: String,
}

/// Owns the unit set and drives scheduling sweeps and fan-out.
///
/// Execution is strictly sequential: one unit at a time, depth-first along
/// reference edges. The per-sweep results map records every unit that
/// actually ran; the call stack passed along each fan-out edge cuts cycles
/// while still allowing a shared sink unit to run once per branch.
pub struct Orchestrator {
    units: Vec<Unit>,
    index: HashMap<String, usize>,
    results: Mutex<HashMap<String, UnitResult>>,
    active_unit: RwLock<String>,
}

impl Orchestrator {
    pub fn new(units: Vec<Unit>) -> Self {
        let index = units
            .iter()
            .enumerate()
            .map(|(i, u)| (u.name().to_string(), i))
            .collect();

        Self {
            units,
            index,
            results: Mutex::new(HashMap::new()),
            active_unit: RwLock::new(String::new()),
        }
    }

    /// One sweep over all trigger units, then return.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<(), EngineError> {
        info!("starting orchestrator");
        self.sweep(cancel, true).await;
        info!("orchestrator finished");
        Ok(())
    }

    /// Sweep immediately, then on every tick until `cancel` fires.
    ///
    /// Returns the cancellation cause ([`EngineError::Cancelled`]); the CLI
    /// maps a signal-initiated shutdown to a clean exit.
    pub async fn run_daemon(&self, cancel: &CancellationToken) -> Result<(), EngineError> {
        info!("starting orchestrator in daemon mode");

        // Startup sweep checks every trigger, including startup-only ones.
        self.sweep(cancel, true).await;

        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately; the startup
        // sweep above already covered it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("orchestrator daemon shutting down");
                    return Err(EngineError::Cancelled);
                }
                _ = ticker.tick() => {
                    self.sweep(cancel, false).await;
                }
            }
        }
    }

    /// Execute one named unit.
    ///
    /// With `with_triggers`, a trigger unit is gated through its manual
    /// check first and fan-out follows the reference lists; without, the
    /// unit runs in isolation.
    pub async fn run_single(
        &self,
        cancel: &CancellationToken,
        name: &str,
        with_triggers: bool,
    ) -> Result<(), EngineError> {
        let Some(unit) = self.lookup(name) else {
            return Err(EngineError::UnitNotFound(name.to_string()));
        };

        info!(unit = %name, with_triggers, "executing single unit");
        self.results
            .lock()
            .expect("results lock poisoned")
            .clear();

        if with_triggers {
            if unit.is_trigger() {
                match unit.check(cancel, CheckMode::Manual).await {
                    Err(err) => {
                        error!(unit = %name, error = %err, "error checking trigger");
                        return Err(EngineError::Other(err));
                    }
                    Ok(false) => {
                        info!(unit = %name, "trigger condition not met; skipping execution");
                        return Ok(());
                    }
                    Ok(true) => {}
                }
            }

            self.execute(unit, cancel, vec![name.to_string()], Invocation::default())
                .await;
        } else {
            self.execute_no_fanout(unit, cancel, &Invocation::default())
                .await;
        }

        let failure = self
            .results
            .lock()
            .expect("results lock poisoned")
            .get(name)
            .and_then(|r| r.error.clone());
        match failure {
            Some(msg) => Err(EngineError::Other(anyhow::anyhow!(msg))),
            None => Ok(()),
        }
    }

    /// The most recent sweep's results.
    pub fn results(&self) -> HashMap<String, UnitResult> {
        self.results.lock().expect("results lock poisoned").clone()
    }

    /// Name of the currently executing unit, or empty.
    pub fn active_unit(&self) -> String {
        self.active_unit
            .read()
            .expect("active unit lock poisoned")
            .clone()
    }

    /// One pass over all trigger units. Check errors and unit failures are
    /// logged and recorded; the sweep itself always completes.
    async fn sweep(&self, cancel: &CancellationToken, is_startup: bool) {
        self.results
            .lock()
            .expect("results lock poisoned")
            .clear();

        for unit in &self.units {
            if cancel.is_cancelled() {
                return;
            }
            if !unit.is_trigger() {
                continue;
            }
            // Startup-only triggers are checked once, on the startup sweep.
            if !is_startup && unit.startup_only() {
                continue;
            }

            match unit.check(cancel, CheckMode::Polling).await {
                Err(err) => {
                    error!(unit = %unit.name(), error = %err, "error checking trigger");
                    continue;
                }
                Ok(false) => continue,
                Ok(true) => {
                    info!(unit = %unit.name(), "trigger activated");
                    self.execute(
                        unit,
                        cancel,
                        vec![unit.name().to_string()],
                        Invocation::default(),
                    )
                    .await;
                }
            }
        }
    }

    /// Run a unit with output capture and record its result; no fan-out.
    ///
    /// Returns the rendered error (if any) and the propagated output.
    async fn execute_no_fanout(
        &self,
        unit: &Unit,
        cancel: &CancellationToken,
        inv: &Invocation,
    ) -> (Option<String>, String) {
        self.set_active(unit.name());

        let sink = CaptureSink::new();
        let error = unit
            .run(cancel, &sink, inv)
            .await
            .err()
            .map(|e| format!("{:#}", e));
        let output = sink.captured();

        if let Some(msg) = &error {
            warn!(unit = %unit.name(), error = %msg, "unit failed");
        }

        self.results.lock().expect("results lock poisoned").insert(
            unit.name().to_string(),
            UnitResult {
                name: unit.name().to_string(),
                kind: unit.kind(),
                error: error.clone(),
                output: output.clone(),
            },
        );

        self.set_active("");
        (error, output)
    }

    /// Run a unit, then expand its reference lists depth-first.
    ///
    /// Boxed because the fan-out recurses back into `execute`.
    fn execute<'a>(
        &'a self,
        unit: &'a Unit,
        cancel: &'a CancellationToken,
        call_stack: Vec<String>,
        inv: Invocation,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let (error, output) = self.execute_no_fanout(unit, cancel, &inv).await;
            self.fan_out(unit, cancel, call_stack, error, output).await;
        })
    }

    /// Expand `on_success` xor `on_failure`, then `always`.
    async fn fan_out(
        &self,
        unit: &Unit,
        cancel: &CancellationToken,
        call_stack: Vec<String>,
        error: Option<String>,
        output: String,
    ) {
        let refs = unit.refs();
        let mut targets: Vec<&String> = Vec::new();
        if error.is_none() {
            targets.extend(refs.on_success.iter());
        } else {
            targets.extend(refs.on_failure.iter());
        }
        targets.extend(refs.always.iter());

        for target_name in targets {
            let Some(target) = self.lookup(target_name) else {
                warn!(
                    unit = %unit.name(),
                    target = %target_name,
                    "referenced unit not found; skipping"
                );
                continue;
            };

            if call_stack.iter().any(|n| n == target_name) {
                info!(
                    unit = %target_name,
                    "already in call stack; skipping to prevent circular dependency"
                );
                continue;
            }

            // A downstream trigger unit re-gates execution through its
            // manual check; action units run unconditionally.
            if target.is_trigger() {
                match target.check(cancel, CheckMode::Manual).await {
                    Err(err) => {
                        error!(unit = %target_name, error = %err, "error checking trigger");
                        continue;
                    }
                    Ok(false) => {
                        info!(unit = %target_name, "trigger condition not met; skipping");
                        continue;
                    }
                    Ok(true) => {
                        info!(unit = %target_name, "trigger condition met");
                    }
                }
            }

            let inv = Invocation {
                triggered_by: Some(unit.name().to_string()),
                output: Some(output.clone()),
                error: error.clone(),
            };

            let mut stack = call_stack.clone();
            stack.push(target_name.clone());

            info!(unit = %target_name, triggered_by = %unit.name(), "triggering unit");
            self.execute(target, cancel, stack, inv).await;
        }
    }

    fn lookup(&self, name: &str) -> Option<&Unit> {
        self.index.get(name).map(|&i| &self.units[i])
    }

    fn set_active(&self, name: &str) {
        *self
            .active_unit
            .write()
            .expect("active unit lock poisoned") = name.to_string();
    }
}
