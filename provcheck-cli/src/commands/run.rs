//! `provcheck run` command handler

use std::io::Write;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use provcheck_core::config::ProvcheckConfig;
use provcheck_harness::lifecycle::DestroyStatus;
use provcheck_harness::orchestrator::{Orchestrator, RunSummary, ScenarioResult};
use provcheck_harness::scenario::Scenario;

use crate::cli::RunArgs;
use crate::commands::lifecycle_from_config;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `run` command.
///
/// Renders the report even when scenarios fail, then maps the outcome to
/// `CliError::Interrupted` or `CliError::ScenarioFailures`.
pub async fn execute(
    args: RunArgs,
    config: &ProvcheckConfig,
    cancel: CancellationToken,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let scenarios = build_scenarios(config, &args.scenarios)?;
    let max_parallel = args.parallel.unwrap_or(config.run.max_parallel);
    if max_parallel == 0 {
        return Err(CliError::Config("--parallel must be at least 1".to_owned()));
    }

    info!(
        scenarios = scenarios.len(),
        max_parallel,
        binary = %config.tool.binary,
        "starting run"
    );

    let orchestrator = Orchestrator::new(lifecycle_from_config(config))
        .with_max_parallel(max_parallel)
        .with_cancellation(cancel.clone());
    let summary = RunSummary::new(orchestrator.run_all(scenarios).await);

    writer.render(&summary)?;

    for leaked in summary.leaked() {
        warn!(
            scenario = %leaked.name,
            "destroy failed, resources may remain; retry with `provcheck destroy {}`",
            leaked.name
        );
    }

    if cancel.is_cancelled() {
        return Err(CliError::Interrupted);
    }
    if !summary.all_passed() {
        return Err(CliError::ScenarioFailures {
            failed: summary.failed,
            total: summary.total,
        });
    }
    Ok(())
}

/// Resolve the selected scenario names into runnable scenarios.
fn build_scenarios(config: &ProvcheckConfig, names: &[String]) -> Result<Vec<Scenario>, CliError> {
    let selected = config
        .select_scenarios(names)
        .map_err(|e| CliError::Config(e.to_string()))?;
    if selected.is_empty() {
        return Err(CliError::Config("no scenarios configured".to_owned()));
    }
    selected
        .into_iter()
        .map(|s| Scenario::from_config(config, s).map_err(|e| CliError::Config(e.to_string())))
        .collect()
}

impl Render for RunSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        for result in &self.results {
            render_scenario(result, w)?;
        }

        writeln!(w)?;
        let failed = if self.failed > 0 {
            self.failed.to_string().red().bold()
        } else {
            self.failed.to_string().normal()
        };
        writeln!(
            w,
            "Summary: {} passed, {} failed, {} total",
            self.passed.to_string().green(),
            failed,
            self.total.to_string().bold()
        )?;
        Ok(())
    }
}

fn render_scenario(result: &ScenarioResult, w: &mut dyn Write) -> std::io::Result<()> {
    use colored::Colorize;

    let status = if result.passed {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    };
    write!(w, "{} {} ({} ms)", status, result.name.bold(), result.duration_ms)?;
    if let Some(stage) = result.failed_stage {
        write!(w, " stage={stage}")?;
    }
    writeln!(w)?;

    for check in &result.checks {
        let mark = if check.passed {
            "ok".green()
        } else {
            "failed".red()
        };
        write!(w, "  [{}] {} {}", mark, check.output, check.predicate)?;
        if let Some(err) = &check.error {
            write!(w, ": {err}")?;
        }
        writeln!(w)?;
    }

    if let Some(err) = &result.error {
        writeln!(w, "  error: {}", err.red())?;
    }

    match &result.destroy {
        DestroyStatus::NotRequired => writeln!(w, "  destroy: not required")?,
        DestroyStatus::Succeeded => writeln!(w, "  destroy: {}", "succeeded".green())?,
        DestroyStatus::Failed { reason } => {
            writeln!(w, "  destroy: {} {}", "FAILED".red().bold(), reason)?;
            writeln!(
                w,
                "  resources may remain; run `provcheck destroy {}`",
                result.name
            )?;
        }
    }
    Ok(())
}
