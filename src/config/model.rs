// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration as read from a YAML file.
///
/// ```yaml
/// config:
///   state_location: /var/lib/trigrun/state.yaml
///
/// units:
///   - cron:
///       name: nightly
///       schedule: "0 2 * * *"
///       on_success: [build]
///   - run:
///       name: build
///       script: |
///         make -C /srv/project all
///       timeout: 30m
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Global settings from the `config:` block.
    pub config: ConfigBlock,

    /// All units, in the order they appear in the file. The order matters:
    /// the scheduler checks triggers in this order.
    #[serde(default)]
    pub units: Vec<UnitEntry>,
}

/// `config:` block.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigBlock {
    /// Path of the YAML state file shared by all units.
    pub state_location: PathBuf,
}

/// One entry of the `units:` list.
///
/// Each entry is a single-key mapping from the unit kind to its options,
/// e.g. `- run: {name: build, script: make}`. All kinds are optional here;
/// validation enforces that exactly one is present per entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitEntry {
    pub start: Option<StartConfig>,
    pub boot: Option<BootConfig>,
    pub reboot: Option<RebootConfig>,
    pub run: Option<RunConfig>,
    pub log: Option<LogConfig>,
    pub count: Option<CountConfig>,
    pub cron: Option<CronConfig>,
    pub file: Option<FileConfig>,
    pub git: Option<GitConfig>,
    pub email: Option<EmailConfig>,
    pub ntfy: Option<NtfyConfig>,
}

impl UnitEntry {
    /// Names of the kinds present in this entry (normally exactly one).
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        if self.start.is_some() {
            kinds.push("start");
        }
        if self.boot.is_some() {
            kinds.push("boot");
        }
        if self.reboot.is_some() {
            kinds.push("reboot");
        }
        if self.run.is_some() {
            kinds.push("run");
        }
        if self.log.is_some() {
            kinds.push("log");
        }
        if self.count.is_some() {
            kinds.push("count");
        }
        if self.cron.is_some() {
            kinds.push("cron");
        }
        if self.file.is_some() {
            kinds.push("file");
        }
        if self.git.is_some() {
            kinds.push("git");
        }
        if self.email.is_some() {
            kinds.push("email");
        }
        if self.ntfy.is_some() {
            kinds.push("ntfy");
        }
        kinds
    }
}

/// Fields every unit kind shares: its name and the reference lists that
/// drive fan-out after it runs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub on_success: Vec<String>,

    #[serde(default)]
    pub on_failure: Vec<String>,

    #[serde(default)]
    pub always: Vec<String>,
}

/// `start` trigger: fires on every startup sweep.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartConfig {
    #[serde(flatten)]
    pub common: CommonConfig,
}

/// `boot` trigger: fires once per OS boot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootConfig {
    #[serde(flatten)]
    pub common: CommonConfig,
}

/// `reboot` action: reboot the machine, optionally after a delay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RebootConfig {
    #[serde(flatten)]
    pub common: CommonConfig,

    /// Delay in seconds before the reboot command is issued.
    #[serde(default)]
    pub delay: u64,
}

/// `run` action: execute a shell script.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(flatten)]
    pub common: CommonConfig,

    /// The script to execute (passed to `<shell> -c`).
    pub script: String,

    /// Optional working directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Optional timeout as a duration string (e.g. `"30s"`, `"5m"`).
    #[serde(default)]
    pub timeout: Option<String>,

    /// Shell to run the script with; defaults to `sh`.
    #[serde(default)]
    pub shell: Option<String>,

    /// Wrap the script in the `script` utility to give it a pseudo-TTY.
    #[serde(default)]
    pub use_pty: bool,
}

/// `log` action: append the upstream unit's output to a file.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(flatten)]
    pub common: CommonConfig,

    /// File to append to; parent directories are created as needed.
    pub file: PathBuf,
}

/// `count` action: tally invocations per triggering unit in the state file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountConfig {
    #[serde(flatten)]
    pub common: CommonConfig,
}

/// `cron` trigger: fires on a five-field cron schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct CronConfig {
    #[serde(flatten)]
    pub common: CommonConfig,

    /// Five-field cron expression (minute hour dom month dow) or a
    /// descriptor like `@daily`.
    pub schedule: String,
}

/// `file` trigger: fires when files matching a glob pattern change.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(flatten)]
    pub common: CommonConfig,

    /// Glob pattern with `**` recursive semantics.
    pub pattern: String,
}

/// `git` trigger: fires when the HEAD of a tracked branch changes.
#[derive(Debug, Clone, Deserialize)]
pub struct GitConfig {
    #[serde(flatten)]
    pub common: CommonConfig,

    /// Path to the repository (bare or working tree).
    pub repository: PathBuf,

    /// Branch to track.
    pub branch: String,

    /// Hard-reset the working tree to `origin/<branch>` instead of merging.
    #[serde(default)]
    pub reset: bool,

    /// Minimum interval between polling checks, as a duration string.
    /// Absent means passive: the unit only checks when invoked manually.
    #[serde(default)]
    pub poll: Option<String>,

    /// Log the output of the underlying git commands.
    #[serde(default)]
    pub debug: bool,
}

/// `email` action: send a notification mail over SMTP.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    #[serde(flatten)]
    pub common: CommonConfig,

    pub to: Vec<String>,
    pub from: String,

    #[serde(default)]
    pub subject_prefix: Option<String>,

    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_user: Option<String>,

    #[serde(default)]
    pub smtp_password: Option<String>,

    /// Use STARTTLS (the default); plain SMTP when false.
    #[serde(default = "default_true")]
    pub smtp_use_tls: bool,

    /// Include the upstream unit's captured output in the body.
    #[serde(default = "default_true")]
    pub include_output: bool,

    /// Truncate the included output to its last N lines.
    #[serde(default)]
    pub limit_lines: Option<usize>,
}

/// `ntfy` action: push a notification to an ntfy topic.
#[derive(Debug, Clone, Deserialize)]
pub struct NtfyConfig {
    #[serde(flatten)]
    pub common: CommonConfig,

    pub topic: String,

    #[serde(default = "default_ntfy_server")]
    pub server: String,

    #[serde(default)]
    pub title_prefix: Option<String>,

    #[serde(default)]
    pub priority: Option<String>,

    #[serde(default)]
    pub tags: Option<String>,

    #[serde(default = "default_true")]
    pub include_output: bool,

    #[serde(default)]
    pub limit_lines: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn default_smtp_port() -> u16 {
    587
}

fn default_ntfy_server() -> String {
    "https://ntfy.sh".to_string()
}
