//! CLI-specific error types and exit code mapping

use provcheck_core::error::ProvcheckError;
use provcheck_harness::error::HarnessError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// One or more scenarios failed a check or lifecycle stage.
    #[error("{failed} of {total} scenario(s) failed")]
    ScenarioFailures { failed: usize, total: usize },

    /// The run was interrupted (Ctrl-C) after cleanup completed.
    #[error("interrupted")]
    Interrupted,

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from provcheck-core.
    #[error("{0}")]
    Core(#[from] ProvcheckError),

    /// Lifecycle error outside a scenario run (e.g. `destroy`).
    #[error("{0}")]
    Harness(#[from] HarnessError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                         |
    /// |------|---------------------------------|
    /// | 0    | Success                         |
    /// | 1    | General / command error         |
    /// | 2    | Configuration error             |
    /// | 3    | At least one scenario failed    |
    /// | 10   | IO error                        |
    /// | 130  | Interrupted by Ctrl-C           |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(ProvcheckError::Config(_)) => 2,
            Self::ScenarioFailures { .. } => 3,
            Self::Io(_) | Self::Core(ProvcheckError::Io(_)) => 10,
            Self::Interrupted => 130,
            Self::Harness(HarnessError::Config(_)) => 2,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Harness(_) => 1,
        }
    }
}
