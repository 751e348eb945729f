// src/units/git.rs

//! Git trigger: fires when the HEAD commit of a tracked branch changes.
//!
//! If the configured path is a local workspace, the check first brings it up
//! to date (fetch, checkout, merge or hard-reset, submodules). Repository
//! detection and HEAD reads go through libgit2; the update steps shell out
//! to the native `git` binary, which handles SSH agents, credential helpers
//! and submodules the way users expect.
//!
//! This is the unit the check-mode protocol exists for. A polling check
//! respects the configured `poll` interval (with no interval the unit is
//! passive and polling does nothing at all), while a manual check coming
//! from another unit's reference list always checks immediately.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use git2::Repository;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::duration::parse_duration;
use crate::config::GitConfig;
use crate::engine::capture::CaptureSink;
use crate::state::StateStore;
use crate::units::{CheckMode, UnitRefs};

const LAST_COMMIT_KEY: &str = "last_commit_hash";

/// Trigger that fires when new commits land on a branch.
#[derive(Debug)]
pub struct GitTrigger {
    pub name: String,
    pub refs: UnitRefs,
    state: StateStore,
    repository: PathBuf,
    branch: String,
    reset: bool,
    poll: Option<Duration>,
    debug: bool,
    last_check: Mutex<Option<Instant>>,
}

impl GitTrigger {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        repository: impl Into<PathBuf>,
        branch: impl Into<String>,
        reset: bool,
        poll: Option<Duration>,
        debug: bool,
        state: StateStore,
        refs: UnitRefs,
    ) -> Self {
        Self {
            name: name.into(),
            refs,
            state,
            repository: repository.into(),
            branch: branch.into(),
            reset,
            poll,
            debug,
            last_check: Mutex::new(None),
        }
    }

    pub fn from_config(cfg: &GitConfig, state: StateStore) -> Result<Self> {
        let poll = cfg
            .poll
            .as_deref()
            .map(|s| {
                parse_duration(s).map_err(|e| {
                    anyhow::anyhow!("unit '{}': invalid poll interval: {}", cfg.common.name, e)
                })
            })
            .transpose()?;

        Ok(Self::new(
            cfg.common.name.clone(),
            cfg.repository.clone(),
            cfg.branch.clone(),
            cfg.reset,
            poll,
            cfg.debug,
            state,
            UnitRefs::from(&cfg.common),
        ))
    }

    /// Check for new commits, honouring the poll interval in polling mode.
    pub async fn check(&self, cancel: &CancellationToken, mode: CheckMode) -> Result<bool> {
        match mode {
            CheckMode::Polling => {
                let Some(interval) = self.poll else {
                    // Passive: only manual invocations reach the repository.
                    return Ok(false);
                };

                let last = *self.last_check.lock().expect("last_check lock poisoned");
                if let Some(t) = last {
                    if t.elapsed() < interval {
                        debug!(unit = %self.name, "poll interval not elapsed; skipping check");
                        return Ok(false);
                    }
                }
            }
            CheckMode::Manual => {}
        }

        *self.last_check.lock().expect("last_check lock poisoned") = Some(Instant::now());
        self.check_repository(cancel).await
    }

    pub fn run(&self, sink: &CaptureSink) -> Result<()> {
        let commit = self
            .current_commit_hash()
            .map(|h| h.chars().take(7).collect::<String>())
            .unwrap_or_else(|_| "unknown".to_string());
        sink.line(&format!(
            "Git trigger '{}' activated (commit: {})",
            self.name, commit
        ));
        Ok(())
    }

    async fn check_repository(&self, cancel: &CancellationToken) -> Result<bool> {
        if self.is_local_workspace() {
            self.update_workspace(cancel)
                .await
                .context("failed to update workspace")?;
        }

        let current = self
            .current_commit_hash()
            .context("failed to check git repository")?;

        let last = self.state.get_string(&self.name, LAST_COMMIT_KEY);
        if last.as_deref() == Some(current.as_str()) {
            return Ok(false);
        }

        self.state
            .set_string(&self.name, LAST_COMMIT_KEY, &current)
            .context("saving commit hash")?;
        Ok(true)
    }

    fn is_local_workspace(&self) -> bool {
        Repository::open(&self.repository).is_ok()
    }

    fn current_commit_hash(&self) -> Result<String> {
        let repo = Repository::open(&self.repository)
            .with_context(|| format!("opening git repository at {:?}", self.repository))?;
        let head = repo.head().context("resolving HEAD")?;
        let commit = head.peel_to_commit().context("peeling HEAD to a commit")?;
        Ok(commit.id().to_string())
    }

    /// Bring the local workspace up to date with `origin/<branch>`.
    ///
    /// Repositories without a remote are left alone.
    async fn update_workspace(&self, cancel: &CancellationToken) -> Result<()> {
        let has_remote = {
            let repo = Repository::open(&self.repository)
                .with_context(|| format!("opening git repository at {:?}", self.repository))?;
            let remotes = repo.remotes().context("listing remotes")?;
            !remotes.is_empty()
        };
        if !has_remote {
            return Ok(());
        }

        info!(unit = %self.name, repository = ?self.repository, "fetching updates");
        self.run_git(cancel, &["fetch", "origin"]).await?;
        self.run_git(cancel, &["checkout", &self.branch]).await?;

        let remote_branch = format!("origin/{}", self.branch);
        if self.reset {
            self.run_git(cancel, &["reset", "--hard", &remote_branch])
                .await?;
            info!(unit = %self.name, "reset workspace to {}", remote_branch);
        } else {
            self.run_git(cancel, &["merge", &remote_branch]).await?;
        }

        self.run_git(cancel, &["submodule", "update", "--init", "--recursive"])
            .await
    }

    async fn run_git(&self, cancel: &CancellationToken, args: &[&str]) -> Result<()> {
        let pretty = format!("git {}", args.join(" "));

        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.repository)
            .kill_on_drop(true);

        let output = tokio::select! {
            out = cmd.output() => out.with_context(|| format!("running {}", pretty))?,
            _ = cancel.cancelled() => bail!("{} cancelled", pretty),
        };

        if self.debug {
            info!(
                unit = %self.name,
                "{}: {}{}",
                pretty,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }

        if !output.status.success() {
            bail!(
                "{} failed: {}",
                pretty,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(())
    }
}
