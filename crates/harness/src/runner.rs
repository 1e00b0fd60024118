//! Process execution abstraction for testability.
//!
//! The [`ProcessRunner`] trait is the narrow seam between the harness and the
//! operating system: a command, its arguments, a working directory and an
//! environment overlay go in, a structured [`InvocationResult`] comes out.
//! Production code uses [`SystemRunner`]; tests substitute a fake that
//! records calls and returns scripted results.
//!
//! ```text
//! ┌──────────────┐
//! │ ToolInvoker  │  (builds tool-specific argv)
//! └──────┬───────┘
//!        │ CommandSpec
//!        ▼
//! ┌──────────────┐
//! │ProcessRunner │ (trait)
//! └──────────────┘
//!     │       │
//!     ▼       ▼
//! ┌──────┐ ┌──────┐
//! │System│ │ Fake │
//! └──┬───┘ └──────┘
//!    │
//!    ▼
//! terraform / tofu
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use provcheck_core::types::InvocationResult;

use crate::error::InvokeError;

/// Default time a stopped tool gets to exit on its own before it is killed.
pub const DEFAULT_INTERRUPT_GRACE: Duration = Duration::from_secs(30);

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute (looked up on `PATH` if not absolute).
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory of the child process.
    pub working_dir: PathBuf,
    /// Variables overlaid on the inherited environment. A key here replaces
    /// an inherited variable with exactly the same name.
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    /// The first argument, used as the subcommand name in logs and errors.
    pub fn subcommand(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }
}

/// Trait abstracting process execution.
///
/// Implementations must not treat a non-zero exit status as an error; that
/// decision belongs to the caller. The errors an implementation reports are
/// [`InvokeError::Spawn`], when the process could not be started at all, and
/// [`InvokeError::Wait`], when a started process could not be awaited.
///
/// When `stop` fires the implementation asks the child to shut down, waits
/// for it to exit, and returns whatever the child produced. Dropping the
/// returned future before completion must still terminate the child.
pub trait ProcessRunner: Send + Sync + 'static {
    /// Runs the command to completion and captures its output.
    fn run(
        &self,
        spec: &CommandSpec,
        stop: &CancellationToken,
    ) -> impl Future<Output = Result<InvocationResult, InvokeError>> + Send;
}

/// Production runner backed by `tokio::process`.
///
/// stdin is closed so the tool can never block on an interactive prompt.
/// A stop request sends SIGINT, which Terraform-compatible tools handle by
/// persisting state and releasing the state lock; the child is killed only
/// if it is still running after the grace period.
#[derive(Debug, Clone, Copy)]
pub struct SystemRunner {
    grace: Duration,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemRunner {
    pub fn new() -> Self {
        Self {
            grace: DEFAULT_INTERRUPT_GRACE,
        }
    }

    /// Sets how long an interrupted child may take to exit. Zero kills at once.
    pub fn with_grace(grace: Duration) -> Self {
        Self { grace }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }
}

impl ProcessRunner for SystemRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        stop: &CancellationToken,
    ) -> Result<InvocationResult, InvokeError> {
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InvokeError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // pipes are drained while waiting so a chatty tool never blocks on a full pipe
        let (status, stdout, stderr) = tokio::join!(
            wait_or_interrupt(&mut child, stop, self.grace),
            read_pipe(stdout),
            read_pipe(stderr),
        );
        let status = status.map_err(|source| InvokeError::Wait {
            program: spec.program.clone(),
            source,
        })?;

        Ok(InvocationResult {
            // None when the child was terminated by a signal
            exit_code: status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

async fn wait_or_interrupt(
    child: &mut Child,
    stop: &CancellationToken,
    grace: Duration,
) -> std::io::Result<ExitStatus> {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = stop.cancelled() => None,
    };
    match exited {
        Some(status) => status,
        None => interrupt(child, grace).await,
    }
}

/// SIGINT first, SIGKILL once `grace` runs out.
async fn interrupt(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    if !grace.is_zero() && send_interrupt(child) {
        debug!(pid = ?child.id(), grace_secs = grace.as_secs(), "interrupt sent to tool");
        if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
            return status;
        }
        warn!(
            pid = ?child.id(),
            grace_secs = grace.as_secs(),
            "tool still running after interrupt, killing it"
        );
    }
    child.kill().await?;
    child.wait().await
}

#[cfg(unix)]
fn send_interrupt(child: &Child) -> bool {
    // None once the child has been reaped
    let Some(pid) = child.id() else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs to a
    // child this process has not reaped yet, so it cannot have been reused.
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
    result == 0
}

#[cfg(not(unix))]
fn send_interrupt(_child: &Child) -> bool {
    false
}

async fn read_pipe<P: AsyncRead + Unpin>(pipe: Option<P>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!(error = %e, "failed to read tool output");
        }
    }
    buf
}
