//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// provcheck -- provisioning verification harness.
///
/// Applies each configured unit, checks its outputs, and always destroys it.
/// Use `provcheck <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "provcheck", version, about, long_about = None)]
pub struct Cli {
    /// Path to the provcheck.toml configuration file.
    #[arg(short, long, global = true, default_value = "provcheck.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision, check and destroy scenarios.
    Run(RunArgs),

    /// List configured scenarios and their checks.
    List,

    /// Validate the configuration file and report errors.
    Validate,

    /// Destroy one scenario's unit (manual cleanup after a failed destroy).
    Destroy(DestroyArgs),
}

// ---- run ----

/// Run scenarios.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run only the named scenario (repeatable). Default: all.
    #[arg(short, long = "scenario")]
    pub scenarios: Vec<String>,

    /// Maximum number of scenarios running at once (overrides run.max_parallel).
    #[arg(short, long)]
    pub parallel: Option<usize>,
}

// ---- destroy ----

/// Destroy a scenario's resources.
#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Scenario name.
    pub name: String,
}
