// src/units/email.rs

//! Email unit: send a notification mail over SMTP.
//!
//! The message is a plain-text RFC 5322 mail whose subject encodes the
//! triggering unit and its outcome (`[prefix: ]unit:success|fail`). The
//! transport speaks STARTTLS by default, plain SMTP when disabled, with
//! optional PLAIN authentication.

use anyhow::{bail, Context, Result};
use chrono::{Local, SecondsFormat};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::EmailConfig;
use crate::engine::capture::CaptureSink;
use crate::units::{tail_lines, Invocation, UnitRefs};

/// Action unit that mails the upstream unit's outcome.
pub struct EmailUnit {
    pub name: String,
    pub refs: UnitRefs,
    to: Vec<Mailbox>,
    from: Mailbox,
    subject_prefix: Option<String>,
    include_output: bool,
    limit_lines: Option<usize>,
    smtp_host: String,
    smtp_port: u16,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for EmailUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailUnit")
            .field("name", &self.name)
            .field("to", &self.to)
            .field("from", &self.from)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .finish_non_exhaustive()
    }
}

impl EmailUnit {
    pub fn from_config(cfg: &EmailConfig) -> Result<Self> {
        let from: Mailbox = cfg
            .from
            .parse()
            .with_context(|| format!("unit '{}': invalid from address", cfg.common.name))?;

        let mut to = Vec::with_capacity(cfg.to.len());
        for addr in &cfg.to {
            let mailbox: Mailbox = addr.parse().with_context(|| {
                format!("unit '{}': invalid to address '{}'", cfg.common.name, addr)
            })?;
            to.push(mailbox);
        }
        if to.is_empty() {
            bail!("unit '{}': at least one to address is required", cfg.common.name);
        }

        let mut builder = if cfg.smtp_use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)
                .with_context(|| format!("unit '{}': invalid smtp host", cfg.common.name))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.smtp_host)
        };
        builder = builder.port(cfg.smtp_port);

        if let (Some(user), Some(password)) = (&cfg.smtp_user, &cfg.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            name: cfg.common.name.clone(),
            refs: UnitRefs::from(&cfg.common),
            to,
            from,
            subject_prefix: cfg.subject_prefix.clone(),
            include_output: cfg.include_output,
            limit_lines: cfg.limit_lines,
            smtp_host: cfg.smtp_host.clone(),
            smtp_port: cfg.smtp_port,
            mailer: builder.build(),
        })
    }

    /// `[<prefix>: ]<triggering-unit>:<success|fail>`
    pub fn subject(&self, inv: &Invocation) -> String {
        let status = if inv.error.is_none() { "success" } else { "fail" };
        let mut subject = match &self.subject_prefix {
            Some(prefix) => format!("{}: ", prefix),
            None => String::new(),
        };
        subject.push_str(&format!("{}:{}", inv.triggering_unit(), status));
        subject
    }

    /// Plain-text body: triggering unit, timestamp, error (if any), and the
    /// optionally tail-truncated upstream output.
    pub fn body(&self, inv: &Invocation) -> String {
        let timestamp = Local::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut body = String::new();
        body.push_str(&format!("Triggered by unit: {}\n", inv.triggering_unit()));
        body.push_str(&format!("Timestamp: {}\n", timestamp));
        if let Some(error) = &inv.error {
            body.push_str(&format!("Error: {}\n", error));
        }
        body.push('\n');

        match (self.include_output, inv.upstream_output()) {
            (true, Some(output)) => {
                body.push_str("Output:\n-------\n");
                body.push_str(&tail_lines(output, self.limit_lines));
                body.push('\n');
            }
            (false, _) => body.push_str("(Output not included)\n"),
            (true, None) => body.push_str("(No output captured)\n"),
        }

        body
    }

    pub async fn run(
        &self,
        cancel: &CancellationToken,
        _sink: &CaptureSink,
        inv: &Invocation,
    ) -> Result<()> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(self.subject(inv))
            .date_now()
            .header(ContentType::TEXT_PLAIN);
        for to in &self.to {
            builder = builder.to(to.clone());
        }

        let message = builder
            .body(self.body(inv))
            .context("building email message")?;

        let send = self.mailer.send(message);
        tokio::select! {
            res = send => {
                res.with_context(|| {
                    format!("failed to send email via {}:{}", self.smtp_host, self.smtp_port)
                })?;
            }
            _ = cancel.cancelled() => bail!("email send cancelled"),
        }

        info!(
            unit = %self.name,
            recipients = self.to.len(),
            "email sent"
        );
        Ok(())
    }
}
