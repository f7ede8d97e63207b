// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::SystemKind;

/// Command-line arguments for `tasksys`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tasksys",
    version,
    about = "Run a batch workload on a thread-pool task system.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the workload file (TOML); defaults to `Workload.toml`.
    #[arg(long, value_name = "PATH")]
    pub workload: Option<PathBuf>,

    /// Task system to use; overrides `[config].system`.
    #[arg(long, value_name = "KIND", value_parser = parse_system)]
    pub system: Option<SystemKind>,

    /// Worker thread budget; overrides `[config].threads`.
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Number of passes over the workload; overrides `[config].repeat`.
    #[arg(long, value_name = "N")]
    pub repeat: Option<usize>,

    /// Run the workload on every task system in turn.
    #[arg(long, conflicts_with = "system")]
    pub all_systems: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKSYS_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the batch graph, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,
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

fn parse_system(s: &str) -> Result<SystemKind, String> {
    s.parse()
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
