// src/units/run.rs

//! Run unit: execute a shell script as a subprocess.
//!
//! Stdout and stderr are piped through the capture sink, so the terminal
//! shows the output live while downstream units get the captured copy. A
//! configured timeout bounds the whole execution; cancellation (signal or
//! timeout) kills the subprocess.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::duration::{format_duration, parse_duration};
use crate::config::RunConfig;
use crate::engine::capture::CaptureSink;
use crate::units::UnitRefs;

const DEFAULT_SHELL: &str = "sh";

/// Action unit that runs a shell script.
#[derive(Debug)]
pub struct RunUnit {
    pub name: String,
    pub refs: UnitRefs,
    script: String,
    directory: Option<PathBuf>,
    timeout: Option<Duration>,
    shell: String,
    use_pty: bool,
}

enum WaitOutcome {
    Exited(std::process::ExitStatus),
    Cancelled,
}

impl RunUnit {
    pub fn new(
        name: impl Into<String>,
        script: impl Into<String>,
        directory: Option<PathBuf>,
        timeout: Option<Duration>,
        shell: Option<String>,
        use_pty: bool,
        refs: UnitRefs,
    ) -> Self {
        Self {
            name: name.into(),
            refs,
            script: script.into(),
            directory,
            timeout,
            shell: shell.unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            use_pty,
        }
    }

    pub fn from_config(cfg: &RunConfig) -> Result<Self> {
        let timeout = cfg
            .timeout
            .as_deref()
            .map(|s| {
                parse_duration(s).map_err(|e| {
                    anyhow::anyhow!("unit '{}': invalid timeout: {}", cfg.common.name, e)
                })
            })
            .transpose()?;

        Ok(Self::new(
            cfg.common.name.clone(),
            cfg.script.clone(),
            cfg.directory.clone(),
            timeout,
            cfg.shell.clone(),
            cfg.use_pty,
            UnitRefs::from(&cfg.common),
        ))
    }

    pub async fn run(&self, cancel: &CancellationToken, sink: &CaptureSink) -> Result<()> {
        info!(unit = %self.name, "running script");

        let mut cmd = self.build_command();
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to execute script for unit '{}'", self.name))?;

        let pumps = [
            spawn_pump(child.stdout.take(), sink.clone()),
            spawn_pump(child.stderr.take(), sink.clone()),
        ];

        let outcome = match self.timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, wait_or_cancelled(&mut child, cancel)).await {
                    Ok(res) => res?,
                    Err(_) => {
                        let _ = child.kill().await;
                        join_pumps(pumps).await;
                        bail!("task timed out after {}", format_duration(timeout));
                    }
                }
            }
            None => wait_or_cancelled(&mut child, cancel).await?,
        };

        match outcome {
            WaitOutcome::Cancelled => {
                let _ = child.kill().await;
                join_pumps(pumps).await;
                bail!("unit '{}' cancelled", self.name);
            }
            WaitOutcome::Exited(status) => {
                join_pumps(pumps).await;

                if !status.success() {
                    bail!("script exited with code {}", status.code().unwrap_or(-1));
                }

                debug!(unit = %self.name, "script completed successfully");
                Ok(())
            }
        }
    }

    /// Build the subprocess: `<shell> -c <script>`, or wrapped in the
    /// `script` utility when a pseudo-TTY is requested (tools like bitbake
    /// refuse to run without one). Shell and script are separate argv
    /// entries, so nothing is re-quoted; the PTY transcript goes to
    /// /dev/null.
    fn build_command(&self) -> Command {
        let mut cmd = if self.use_pty {
            let mut c = Command::new("script");
            c.arg("-q")
                .arg("-e")
                .arg("-c")
                .arg(&self.shell)
                .arg("-c")
                .arg(&self.script)
                .arg("/dev/null");
            c
        } else {
            let mut c = Command::new(&self.shell);
            c.arg("-c").arg(&self.script);
            c
        };

        if let Some(dir) = &self.directory {
            debug!(unit = %self.name, directory = ?dir, "using working directory");
            cmd.current_dir(dir);
        }

        // Inherited environment plus a sane TERM for tools that expect one.
        cmd.env("TERM", "xterm-256color");
        cmd
    }
}

async fn wait_or_cancelled(child: &mut Child, cancel: &CancellationToken) -> Result<WaitOutcome> {
    tokio::select! {
        status = child.wait() => {
            Ok(WaitOutcome::Exited(status.context("waiting for script process")?))
        }
        _ = cancel.cancelled() => Ok(WaitOutcome::Cancelled),
    }
}

/// Drain a child pipe into the sink, chunk by chunk, preserving the raw
/// bytes (colors and carriage returns included).
fn spawn_pump<R>(reader: Option<R>, sink: CaptureSink) -> Option<JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    reader.map(|mut r| {
        tokio::spawn(async move {
            let mut buf = [0u8; 8192];
            loop {
                match r.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.write_chunk(&buf[..n]),
                }
            }
        })
    })
}

async fn join_pumps(pumps: [Option<JoinHandle<()>>; 2]) {
    for pump in pumps.into_iter().flatten() {
        let _ = pump.await;
    }
}
