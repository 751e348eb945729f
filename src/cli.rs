// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `trigrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "trigrun",
    version,
    about = "Run units (scripts, notifications) when triggers fire.",
    long_about = None
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TRIGRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Load a config file and execute its units.
    Run {
        /// Path to the config file (YAML).
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Keep running and re-check triggers every 10 seconds.
        #[arg(long)]
        daemon: bool,

        /// Run a single named unit in isolation, without fan-out.
        #[arg(long, value_name = "NAME", conflicts_with = "trigger")]
        unit: Option<String>,

        /// Run a single named unit and follow its reference lists.
        ///
        /// Trigger units are gated through their manual check first.
        #[arg(long, value_name = "NAME")]
        trigger: Option<String>,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
