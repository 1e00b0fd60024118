//! `provcheck destroy` command handler
//!
//! Operator-driven cleanup for a scenario whose automatic destroy failed.
//! Runs destroy once; no init or apply.

use std::io::Write;

use serde::Serialize;
use tracing::info;

use provcheck_core::config::ProvcheckConfig;
use provcheck_core::types::ConfigurationDescriptor;
use provcheck_harness::lifecycle::LifecycleRunner;
use provcheck_harness::runner::ProcessRunner;

use crate::cli::DestroyArgs;
use crate::commands::lifecycle_from_config;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `destroy` command.
pub async fn execute(
    args: DestroyArgs,
    config: &ProvcheckConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let descriptor = resolve(config, &args.name)?;
    info!(scenario = %args.name, unit = %descriptor, "manual destroy requested");

    let lifecycle = lifecycle_from_config(config);
    destroy(&lifecycle, &args.name, &descriptor, writer).await
}

fn resolve(config: &ProvcheckConfig, name: &str) -> Result<ConfigurationDescriptor, CliError> {
    let scenario = config
        .scenario(name)
        .ok_or_else(|| CliError::Config(format!("unknown scenario '{name}'")))?;
    Ok(config.descriptor_for(scenario))
}

async fn destroy<R: ProcessRunner>(
    lifecycle: &LifecycleRunner<R>,
    name: &str,
    descriptor: &ConfigurationDescriptor,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let result = lifecycle.teardown(descriptor).await;
    let report = DestroyReport {
        scenario: name.to_owned(),
        unit_path: descriptor.unit_path().display().to_string(),
        destroyed: result.is_ok(),
        error: result.as_ref().err().map(ToString::to_string),
    };
    writer.render(&report)?;
    result.map_err(CliError::from)
}

/// Manual destroy outcome.
#[derive(Debug, Serialize)]
pub struct DestroyReport {
    pub scenario: String,
    pub unit_path: String,
    pub destroyed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Render for DestroyReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Destroy: {} ({})", self.scenario.bold(), self.unit_path)?;
        if self.destroyed {
            writeln!(w, "  Result: {}", "DESTROYED".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "FAILED".red().bold())?;
            if let Some(err) = &self.error {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}
