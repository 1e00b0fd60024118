//! Command handlers -- one module per subcommand

pub mod destroy;
pub mod list;
pub mod run;
pub mod validate;

use std::path::Path;

use provcheck_core::config::ProvcheckConfig;
use provcheck_harness::invoker::ToolInvoker;
use provcheck_harness::lifecycle::{LifecycleRunner, StageTimeouts};
use provcheck_harness::runner::SystemRunner;

use crate::error::CliError;

/// Load and validate the configuration, anchoring `run.root_dir` to the
/// directory that contains the config file.
pub async fn load_config(path: &Path) -> Result<ProvcheckConfig, CliError> {
    let mut config = ProvcheckConfig::load(path).await?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.anchor_root_dir(base);
    Ok(config)
}

/// Build a lifecycle runner that drives the configured tool binary.
pub fn lifecycle_from_config(config: &ProvcheckConfig) -> LifecycleRunner<SystemRunner> {
    let runner = SystemRunner::with_grace(config.tool.interrupt_grace());
    let invoker = ToolInvoker::new(runner, config.tool.binary.as_str())
        .with_no_color(config.tool.no_color);
    LifecycleRunner::new(invoker).with_timeouts(StageTimeouts::from_config(
        &config.tool,
        &config.run,
    ))
}
