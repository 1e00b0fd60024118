//! `provcheck validate` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::commands::load_config;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `validate` command.
///
/// Loads and validates the configuration file, reporting any errors.
/// Returns `CliError::Config` if validation fails.
pub async fn execute(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = ConfigValidationReport::check(config_path).await;
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Configuration validation report.
#[derive(Debug, Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    pub valid: bool,
    /// Number of scenarios (0 when invalid)
    pub scenarios: usize,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl ConfigValidationReport {
    pub async fn check(config_path: &Path) -> Self {
        let source = config_path.display().to_string();
        match load_config(config_path).await {
            Ok(config) => Self {
                source,
                valid: true,
                scenarios: config.scenarios.len(),
                errors: Vec::new(),
            },
            Err(e) => Self {
                source,
                valid: false,
                scenarios: 0,
                errors: vec![e.to_string()],
            },
        }
    }
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
            writeln!(w, "  Scenarios: {}", self.scenarios)?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}
