//! Lifecycle runner: init, apply, outputs, and a guaranteed destroy.
//!
//! [`LifecycleRunner::with_provisioned`] is the scoped-acquisition entry point.
//! The caller receives the provisioned [`OutputSet`] inside a body future, and
//! destroy runs exactly once after any apply attempt, whatever the body does:
//!
//! ```text
//!  lock(unit) ─► init ──fail──────────────────────────────► report (no destroy)
//!                 │
//!                 ▼
//!               apply ─fail─┐
//!                 │         │
//!                 ▼         │
//!              outputs ─fail┤
//!                 │         │
//!                 ▼         │
//!     body(outputs) ────────┤  Ok / Err / panic / timeout / cancel
//!                           ▼
//!                        destroy (never cancelled) ─► report ─► unlock(unit)
//! ```
//!
//! The per-unit lock is held from init through destroy, so two runs against
//! the same unit directory never overlap.
//!
//! Cancellation and stage timeouts stop the running tool through the runner
//! (SIGINT, then a kill after the grace period) and wait for it to exit before
//! destroy starts. If the caller drops the lifecycle future instead, a drop
//! guard hands destroy and the unit lock to a background task on the current
//! tokio runtime.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use metrics::{counter, histogram};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use provcheck_core::config::{RunConfig, ToolConfig};
use provcheck_core::metrics::{DESTROY_FAILURES_TOTAL, LABEL_STAGE, STAGE_DURATION_SECONDS};
use provcheck_core::types::{ConfigurationDescriptor, InvocationResult, OutputSet, Stage};

use crate::error::{HarnessError, InvokeError};
use crate::invoker::{Subcommand, ToolInvoker, parse_output_listing};
use crate::lock::UnitLocks;
use crate::runner::ProcessRunner;

/// Time limits for each lifecycle stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTimeouts {
    pub init: Duration,
    pub apply: Duration,
    pub output: Duration,
    pub destroy: Duration,
    /// Limit on the caller's body. `None` means unbounded.
    pub body: Option<Duration>,
}

impl StageTimeouts {
    pub fn from_config(tool: &ToolConfig, run: &RunConfig) -> Self {
        Self {
            init: tool.init_timeout(),
            apply: tool.apply_timeout(),
            output: tool.output_timeout(),
            destroy: tool.destroy_timeout(),
            body: run.scenario_timeout(),
        }
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self::from_config(&ToolConfig::default(), &RunConfig::default())
    }
}

/// Outcome of the destroy step, as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DestroyStatus {
    /// Apply was never attempted, so there was nothing to tear down.
    NotRequired,
    Succeeded,
    /// Resources may have leaked.
    Failed { reason: String },
}

impl DestroyStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of one scoped lifecycle run.
///
/// The primary outcome and the destroy result are kept apart so that a destroy
/// failure never overwrites what the body observed.
#[derive(Debug)]
pub struct LifecycleReport<T> {
    /// Init/apply/outputs failure, or whatever the body returned.
    pub outcome: Result<T, HarnessError>,
    /// `None` when destroy was not required (init failed or apply never started).
    pub destroy: Option<Result<(), HarnessError>>,
}

impl<T> LifecycleReport<T> {
    pub fn destroy_attempted(&self) -> bool {
        self.destroy.is_some()
    }

    pub fn destroy_status(&self) -> DestroyStatus {
        match &self.destroy {
            None => DestroyStatus::NotRequired,
            Some(Ok(())) => DestroyStatus::Succeeded,
            Some(Err(e)) => DestroyStatus::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// Folds both results into one. The primary failure stays first; a destroy
    /// failure on its own becomes the error.
    pub fn into_result(self) -> Result<T, HarnessError> {
        match (self.outcome, self.destroy) {
            (Ok(value), None | Some(Ok(()))) => Ok(value),
            (Ok(_), Some(Err(cleanup))) => Err(cleanup),
            (Err(primary), None | Some(Ok(()))) => Err(primary),
            (Err(primary), Some(Err(cleanup))) => Err(HarnessError::WithCleanup {
                primary: Box::new(primary),
                cleanup: Box::new(cleanup),
            }),
        }
    }
}

enum BringUp {
    Ready(OutputSet),
    Failed {
        error: HarnessError,
        needs_destroy: bool,
    },
}

/// Destroys the unit from a background task when the lifecycle future is
/// dropped after apply started and before its own destroy finished.
///
/// Owns the unit lock so that the next run of the same unit waits for the
/// background destroy.
struct PendingDestroy<R: ProcessRunner> {
    invoker: Arc<ToolInvoker<R>>,
    descriptor: ConfigurationDescriptor,
    limit: Duration,
    unit: Option<OwnedMutexGuard<()>>,
    armed: bool,
}

impl<R: ProcessRunner> PendingDestroy<R> {
    fn new(
        runner: &LifecycleRunner<R>,
        descriptor: &ConfigurationDescriptor,
        unit: OwnedMutexGuard<()>,
    ) -> Self {
        Self {
            invoker: Arc::clone(&runner.invoker),
            descriptor: descriptor.clone(),
            limit: runner.timeouts.destroy,
            unit: Some(unit),
            armed: false,
        }
    }

    /// Called right before apply is invoked.
    fn arm(&mut self) {
        self.armed = true;
    }

    /// Destroy is settled (done or not needed); releases the unit lock.
    fn release(mut self) {
        self.armed = false;
    }
}

impl<R: ProcessRunner> Drop for PendingDestroy<R> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let unit_path = self.descriptor.unit_path().display().to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    unit = %unit_path,
                    "lifecycle dropped after apply started, destroying in background"
                );
                let invoker = Arc::clone(&self.invoker);
                let descriptor = self.descriptor.clone();
                let limit = self.limit;
                let unit = self.unit.take();
                handle.spawn(async move {
                    let _unit = unit;
                    // failures are logged and counted inside
                    let _ = destroy_unit(&invoker, &descriptor, limit).await;
                });
            }
            Err(_) => {
                counter!(DESTROY_FAILURES_TOTAL).increment(1);
                error!(
                    unit = %unit_path,
                    "lifecycle dropped outside a tokio runtime, destroy skipped; resources may have leaked"
                );
            }
        }
    }
}

/// Sequences the provisioning tool's lifecycle for one descriptor at a time.
pub struct LifecycleRunner<R: ProcessRunner> {
    invoker: Arc<ToolInvoker<R>>,
    timeouts: StageTimeouts,
    locks: UnitLocks,
}

impl<R: ProcessRunner> LifecycleRunner<R> {
    pub fn new(invoker: ToolInvoker<R>) -> Self {
        Self {
            invoker: Arc::new(invoker),
            timeouts: StageTimeouts::default(),
            locks: UnitLocks::new(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Shares a lock registry with other runners in the same process.
    pub fn with_locks(mut self, locks: UnitLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn invoker(&self) -> &ToolInvoker<R> {
        &self.invoker
    }

    pub fn timeouts(&self) -> &StageTimeouts {
        &self.timeouts
    }

    /// Runs init, apply and reads outputs.
    ///
    /// If apply was attempted and anything after it fails, destroy runs before
    /// the error is returned, also when this future is dropped mid-apply. On
    /// success the resources stay up and the caller owns the matching
    /// [`teardown`](Self::teardown) call.
    pub async fn provision(
        &self,
        descriptor: &ConfigurationDescriptor,
    ) -> Result<OutputSet, HarnessError> {
        let unit = self.locks.lock(descriptor.unit_path()).await;
        let mut pending = PendingDestroy::new(self, descriptor, unit);
        let cancel = CancellationToken::new();

        let result = match self.bring_up(descriptor, &cancel, &mut pending).await {
            BringUp::Ready(outputs) => Ok(outputs),
            BringUp::Failed {
                error,
                needs_destroy: false,
            } => Err(error),
            BringUp::Failed {
                error,
                needs_destroy: true,
            } => match self.destroy(descriptor).await {
                Ok(()) => Err(error),
                Err(cleanup) => Err(HarnessError::WithCleanup {
                    primary: Box::new(error),
                    cleanup: Box::new(cleanup),
                }),
            },
        };
        pending.release();
        result
    }

    /// Destroys the unit's resources.
    pub async fn teardown(&self, descriptor: &ConfigurationDescriptor) -> Result<(), HarnessError> {
        let _unit = self.locks.lock(descriptor.unit_path()).await;
        self.destroy(descriptor).await
    }

    /// Reads a single output with `output -raw`.
    pub async fn read_output(
        &self,
        descriptor: &ConfigurationDescriptor,
        name: &str,
    ) -> Result<String, HarnessError> {
        let cancel = CancellationToken::new();
        let result = self
            .invoke(
                descriptor,
                &Subcommand::OutputRaw(name.to_owned()),
                Stage::Outputs,
                self.timeouts.output,
                &cancel,
            )
            .await
            .map_err(HarnessError::Outputs)?;
        Ok(result.stdout)
    }

    /// Provisions the unit, runs `body` with its outputs, then destroys it.
    ///
    /// Destroy runs exactly once after any apply attempt: on body success or
    /// error, on a panic inside the body, when the body exceeds
    /// [`StageTimeouts::body`], and when `cancel` fires during apply, output
    /// reading or the body. Destroy itself is not cancellable.
    ///
    /// Dropping the returned future after apply started moves destroy to a
    /// background task on the current runtime. The unit stays locked until
    /// that destroy finishes. A destroy that was itself interrupted by the
    /// drop is started again.
    pub async fn with_provisioned<T, F, Fut>(
        &self,
        descriptor: &ConfigurationDescriptor,
        cancel: &CancellationToken,
        body: F,
    ) -> LifecycleReport<T>
    where
        F: FnOnce(OutputSet) -> Fut,
        Fut: Future<Output = Result<T, HarnessError>>,
    {
        let unit = self.locks.lock(descriptor.unit_path()).await;
        let mut pending = PendingDestroy::new(self, descriptor, unit);
        info!(unit = %descriptor, "provisioning unit");

        let outputs = match self.bring_up(descriptor, cancel, &mut pending).await {
            BringUp::Ready(outputs) => outputs,
            BringUp::Failed {
                error,
                needs_destroy,
            } => {
                warn!(
                    unit = %descriptor.unit_path().display(),
                    stage = ?error.stage(),
                    error = %error,
                    "provisioning failed"
                );
                let destroy = if needs_destroy {
                    Some(self.destroy(descriptor).await)
                } else {
                    None
                };
                pending.release();
                return LifecycleReport {
                    outcome: Err(error),
                    destroy,
                };
            }
        };

        debug!(outputs = outputs.len(), "outputs read, running checks");
        let started = Instant::now();
        let outcome = self.run_body(outputs, cancel, body).await;
        histogram!(STAGE_DURATION_SECONDS, LABEL_STAGE => Stage::Validate.as_str())
            .record(started.elapsed().as_secs_f64());

        let destroy = self.destroy(descriptor).await;
        pending.release();
        LifecycleReport {
            outcome,
            destroy: Some(destroy),
        }
    }

    async fn run_body<T, F, Fut>(
        &self,
        outputs: OutputSet,
        cancel: &CancellationToken,
        body: F,
    ) -> Result<T, HarnessError>
    where
        F: FnOnce(OutputSet) -> Fut,
        Fut: Future<Output = Result<T, HarnessError>>,
    {
        // the call to `body` happens inside the guarded future so a panic
        // before its first await is caught as well
        let guarded = async {
            match AssertUnwindSafe(async move { body(outputs).await })
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(panic = %message, "scenario body panicked");
                    Err(HarnessError::Panicked(message))
                }
            }
        };

        let bounded = async {
            match self.timeouts.body {
                Some(limit) => tokio::time::timeout(limit, guarded)
                    .await
                    .unwrap_or_else(|_| Err(HarnessError::TimedOut { after: limit })),
                None => guarded.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HarnessError::Cancelled),
            result = bounded => result,
        }
    }

    async fn bring_up(
        &self,
        descriptor: &ConfigurationDescriptor,
        cancel: &CancellationToken,
        pending: &mut PendingDestroy<R>,
    ) -> BringUp {
        if let Err(e) = self
            .invoke(
                descriptor,
                &Subcommand::Init,
                Stage::Init,
                self.timeouts.init,
                cancel,
            )
            .await
        {
            return BringUp::Failed {
                error: HarnessError::Init(e),
                needs_destroy: false,
            };
        }

        pending.arm();
        if let Err(e) = self
            .invoke(
                descriptor,
                &Subcommand::Apply,
                Stage::Apply,
                self.timeouts.apply,
                cancel,
            )
            .await
        {
            // a partially successful apply may have created resources
            let needs_destroy = !e.never_started();
            return BringUp::Failed {
                error: HarnessError::Apply(e),
                needs_destroy,
            };
        }

        let listing = self
            .invoke(
                descriptor,
                &Subcommand::OutputJson,
                Stage::Outputs,
                self.timeouts.output,
                cancel,
            )
            .await
            .map_err(HarnessError::Outputs)
            .and_then(|result| parse_output_listing(&result.stdout));

        match listing {
            Ok(outputs) => BringUp::Ready(outputs),
            Err(error) => BringUp::Failed {
                error,
                needs_destroy: true,
            },
        }
    }

    async fn destroy(&self, descriptor: &ConfigurationDescriptor) -> Result<(), HarnessError> {
        destroy_unit(&self.invoker, descriptor, self.timeouts.destroy).await
    }

    async fn invoke(
        &self,
        descriptor: &ConfigurationDescriptor,
        subcommand: &Subcommand,
        stage: Stage,
        limit: Duration,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult, InvokeError> {
        run_stage(&self.invoker, descriptor, subcommand, stage, limit, cancel).await
    }
}

async fn destroy_unit<R: ProcessRunner>(
    invoker: &ToolInvoker<R>,
    descriptor: &ConfigurationDescriptor,
    limit: Duration,
) -> Result<(), HarnessError> {
    info!(unit = %descriptor.unit_path().display(), "destroying unit");
    let uncancellable = CancellationToken::new();

    match run_stage(
        invoker,
        descriptor,
        &Subcommand::Destroy,
        Stage::Destroy,
        limit,
        &uncancellable,
    )
    .await
    {
        Ok(_) => {
            info!(unit = %descriptor.unit_path().display(), "unit destroyed");
            Ok(())
        }
        Err(e) => {
            counter!(DESTROY_FAILURES_TOTAL).increment(1);
            error!(
                unit = %descriptor.unit_path().display(),
                error = %e,
                "destroy failed, resources may have leaked"
            );
            Err(HarnessError::Destroy(e))
        }
    }
}

enum Interrupt {
    Cancelled,
    TimedOut,
}

/// Runs one stage under `limit` and `cancel`.
///
/// On cancel or timeout the tool is asked to stop and this waits until it has
/// exited, so the next stage never races a tool that still holds the state.
async fn run_stage<R: ProcessRunner>(
    invoker: &ToolInvoker<R>,
    descriptor: &ConfigurationDescriptor,
    subcommand: &Subcommand,
    stage: Stage,
    limit: Duration,
    cancel: &CancellationToken,
) -> Result<InvocationResult, InvokeError> {
    if cancel.is_cancelled() {
        return Err(InvokeError::Cancelled {
            subcommand: subcommand.name().to_owned(),
        });
    }

    debug!(stage = %stage, unit = %descriptor.unit_path().display(), "stage started");
    let started = Instant::now();

    let stop = CancellationToken::new();
    let run = invoker.run(descriptor, subcommand, &stop);
    tokio::pin!(run);
    let deadline = tokio::time::sleep(limit);
    tokio::pin!(deadline);

    let finished = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        _ = &mut deadline => Err(Interrupt::TimedOut),
        result = &mut run => Ok(result),
    };

    let result = match finished {
        Ok(result) => result,
        Err(interrupt) => {
            stop.cancel();
            if let Err(e) = run.await {
                debug!(stage = %stage, error = %e, "stopped tool exited");
            }
            match interrupt {
                Interrupt::Cancelled => Err(InvokeError::Cancelled {
                    subcommand: subcommand.name().to_owned(),
                }),
                Interrupt::TimedOut => Err(InvokeError::Timeout {
                    subcommand: subcommand.name().to_owned(),
                    after: limit,
                }),
            }
        }
    };

    let elapsed = started.elapsed();
    histogram!(STAGE_DURATION_SECONDS, LABEL_STAGE => stage.as_str())
        .record(elapsed.as_secs_f64());
    debug!(
        stage = %stage,
        elapsed_ms = elapsed.as_millis() as u64,
        ok = result.is_ok(),
        "stage finished"
    );
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
