// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod state;
pub mod units;

use std::path::PathBuf;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::{CliArgs, Command};
use crate::engine::Orchestrator;
use crate::errors::EngineError;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - unit construction + the shared state store
/// - the orchestrator (one-shot, daemon, or single-unit mode)
/// - INT/TERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Run {
            config,
            daemon,
            unit,
            trigger,
        } => run_units(config, daemon, unit, trigger).await,
    }
}

async fn run_units(
    config_path: PathBuf,
    daemon: bool,
    unit: Option<String>,
    trigger: Option<String>,
) -> Result<()> {
    let cfg = config::load_and_validate(&config_path)?;
    let (units, _state) = config::build_units(&cfg)?;
    info!(units = units.len(), config = ?config_path, "configuration loaded");

    let orchestrator = Orchestrator::new(units);
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    if let Some(name) = unit {
        info!(unit = %name, "running single unit (fan-out disabled)");
        orchestrator.run_single(&cancel, &name, false).await?;
        return Ok(());
    }

    if let Some(name) = trigger {
        info!(unit = %name, "running single unit with fan-out");
        orchestrator.run_single(&cancel, &name, true).await?;
        return Ok(());
    }

    let result = if daemon {
        orchestrator.run_daemon(&cancel).await
    } else {
        orchestrator.run_once(&cancel).await
    };

    match result {
        // A signal-initiated shutdown is a clean exit.
        Err(EngineError::Cancelled) => {
            info!("shutdown complete");
            Ok(())
        }
        other => Ok(other?),
    }
}

/// Trap INT and TERM and turn them into a cancellation.
///
/// The token is observed by every in-flight check and run; the orchestrator
/// finishes (or kills) the active unit and returns.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let interrupted = wait_for_termination().await;
        if interrupted {
            info!("termination signal received; shutting down");
            cancel.cancel();
        }
    });
}

#[cfg(unix)]
async fn wait_for_termination() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            eprintln!("failed to install SIGTERM handler: {err}");
            return false;
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.is_ok(),
        _ = term.recv() => true,
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() -> bool {
    tokio::signal::ctrl_c().await.is_ok()
}
