// src/units/ntfy.rs

//! Ntfy unit: push a notification to an ntfy topic over HTTP.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Local, SecondsFormat};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::NtfyConfig;
use crate::engine::capture::CaptureSink;
use crate::units::{tail_lines, Invocation, UnitRefs};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Action unit that POSTs the upstream unit's outcome to an ntfy server.
#[derive(Debug)]
pub struct NtfyUnit {
    pub name: String,
    pub refs: UnitRefs,
    topic: String,
    server: String,
    title_prefix: Option<String>,
    priority: Option<String>,
    tags: Option<String>,
    include_output: bool,
    limit_lines: Option<usize>,
    client: reqwest::Client,
}

impl NtfyUnit {
    pub fn from_config(cfg: &NtfyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("building http client")?;

        Ok(Self {
            name: cfg.common.name.clone(),
            refs: UnitRefs::from(&cfg.common),
            topic: cfg.topic.clone(),
            server: cfg.server.trim_end_matches('/').to_string(),
            title_prefix: cfg.title_prefix.clone(),
            priority: cfg.priority.clone(),
            tags: cfg.tags.clone(),
            include_output: cfg.include_output,
            limit_lines: cfg.limit_lines,
            client,
        })
    }

    /// `[<prefix>: ]<triggering-unit>:<success|fail>`
    pub fn title(&self, inv: &Invocation) -> String {
        let status = if inv.error.is_none() { "success" } else { "fail" };
        let mut title = match &self.title_prefix {
            Some(prefix) => format!("{}: ", prefix),
            None => String::new(),
        };
        title.push_str(&format!("{}:{}", inv.triggering_unit(), status));
        title
    }

    /// Notification body: triggering unit, timestamp, error (if any), and
    /// the optionally tail-truncated upstream output.
    pub fn body(&self, inv: &Invocation) -> String {
        let timestamp = Local::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut body = String::new();
        body.push_str(&format!("Triggered by: {}\n", inv.triggering_unit()));
        body.push_str(&format!("Timestamp: {}\n", timestamp));
        if let Some(error) = &inv.error {
            body.push_str(&format!("Error: {}\n", error));
        }

        match (self.include_output, inv.upstream_output()) {
            (true, Some(output)) => {
                body.push_str("\nOutput:\n");
                body.push_str(&tail_lines(output, self.limit_lines));
            }
            (false, _) => body.push_str("\n(Output not included)"),
            (true, None) => body.push_str("\n(No output captured)"),
        }

        body
    }

    pub async fn run(
        &self,
        cancel: &CancellationToken,
        _sink: &CaptureSink,
        inv: &Invocation,
    ) -> Result<()> {
        let url = format!("{}/{}", self.server, self.topic);

        let mut request = self.client.post(&url).body(self.body(inv));
        request = request.header("Title", self.title(inv));
        if let Some(priority) = &self.priority {
            request = request.header("Priority", priority.clone());
        }
        if let Some(tags) = &self.tags {
            request = request.header("Tags", tags.clone());
        }

        let response = tokio::select! {
            res = request.send() => {
                res.with_context(|| format!("failed to send notification to {}", url))?
            }
            _ = cancel.cancelled() => bail!("ntfy send cancelled"),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("ntfy server returned status {}: {}", status.as_u16(), body);
        }

        info!(unit = %self.name, url = %url, "notification sent");
        Ok(())
    }
}
