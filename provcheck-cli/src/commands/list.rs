//! `provcheck list` command handler

use std::io::Write;

use serde::Serialize;

use provcheck_core::config::ProvcheckConfig;
use provcheck_harness::scenario::Scenario;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `list` command.
pub fn execute(config: &ProvcheckConfig, writer: &OutputWriter) -> Result<(), CliError> {
    let listing = ScenarioListing::from_config(config)?;
    writer.render(&listing)
}

/// Configured scenarios with resolved unit paths.
#[derive(Debug, Serialize)]
pub struct ScenarioListing {
    pub total: usize,
    pub scenarios: Vec<ScenarioEntry>,
}

#[derive(Debug, Serialize)]
pub struct ScenarioEntry {
    pub name: String,
    pub unit_path: String,
    pub variables: usize,
    /// "output predicate" per check, in evaluation order
    pub checks: Vec<String>,
}

impl ScenarioListing {
    pub fn from_config(config: &ProvcheckConfig) -> Result<Self, CliError> {
        let scenarios = config
            .scenarios
            .iter()
            .map(|s| {
                let scenario =
                    Scenario::from_config(config, s).map_err(|e| CliError::Config(e.to_string()))?;
                Ok(ScenarioEntry {
                    name: scenario.name,
                    unit_path: scenario.descriptor.unit_path().display().to_string(),
                    variables: scenario.descriptor.variables().len(),
                    checks: scenario
                        .checks
                        .iter()
                        .map(|c| format!("{} {}", c.output, c.predicate))
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>, CliError>>()?;

        Ok(Self {
            total: scenarios.len(),
            scenarios,
        })
    }
}

impl Render for ScenarioListing {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Scenarios: {}", self.total.to_string().bold())?;
        for entry in &self.scenarios {
            writeln!(
                w,
                "  {} -> {} (vars={})",
                entry.name.bold(),
                entry.unit_path,
                entry.variables
            )?;
            for check in &entry.checks {
                writeln!(w, "    - {check}")?;
            }
        }
        Ok(())
    }
}
