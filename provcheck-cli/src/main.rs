//! provcheck -- provisioning verification harness CLI

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::future::Future;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use provcheck_core::config::GeneralConfig;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let writer = OutputWriter::new(cli.output);

    if let Err(e) = dispatch(cli, &writer).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn dispatch(cli: Cli, writer: &OutputWriter) -> Result<(), CliError> {
    // validate는 설정이 깨져 있어도 보고서를 출력해야 하므로 기본 로깅으로 시작
    if let Commands::Validate = cli.command {
        let mut general = GeneralConfig::default();
        if let Some(level) = cli.log_level {
            general.log_level = level;
        }
        init_logging(&general)?;
        return commands::validate::execute(&cli.config, writer).await;
    }

    let mut config = commands::load_config(&cli.config).await?;
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    init_logging(&config.general)?;
    provcheck_core::metrics::describe_all();

    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    match cli.command {
        Commands::Run(args) => {
            let cancel = CancellationToken::new();
            spawn_interrupt_handler(cancel.clone());
            commands::run::execute(args, &config, cancel, writer).await
        }
        Commands::List => commands::list::execute(&config, writer),
        Commands::Destroy(args) => commands::destroy::execute(args, &config, writer).await,
        Commands::Validate => Ok(()),
    }
}

fn init_logging(general: &GeneralConfig) -> Result<(), CliError> {
    logging::init_tracing(general).map_err(|e| CliError::Command(e.to_string()))
}

/// Ctrl-C 수신 시 실행을 취소합니다. destroy는 취소 대상이 아닙니다.
///
/// 두 번째 Ctrl-C는 destroy를 기다리지 않고 즉시 종료합니다.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if forward_interrupts(tokio::signal::ctrl_c, cancel).await {
            tracing::error!(
                "second interrupt received, exiting without waiting for destroy; \
                 resources may remain, run `provcheck destroy <scenario>`"
            );
            std::process::exit(130);
        }
    });
}

/// 첫 신호는 `cancel`을 취소하고, 두 번째 신호가 오면 `true`를 반환합니다.
/// 신호를 수신할 수 없으면 `false`를 반환합니다.
async fn forward_interrupts<F, Fut>(mut next_signal: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = next_signal().await {
        tracing::error!(error = %e, "failed to listen for interrupt signal");
        return false;
    }
    tracing::warn!(
        "interrupt received, cancelling run; destroy will still complete \
         (press Ctrl-C again to exit immediately)"
    );
    cancel.cancel();

    match next_signal().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for interrupt signal");
            false
        }
    }
}
