//! Scripted `ProcessRunner` for E2E lifecycle tests.
//!
//! Responses are keyed by (unit path, subcommand). Anything not scripted
//! succeeds with empty output. Every call is recorded so tests can assert the
//! exact sequence of tool invocations, and in-flight calls are tracked per unit
//! to detect overlapping runs against the same directory. A delayed call that
//! is told to stop answers like an interrupted tool (exit 130) and is recorded
//! as interrupted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use provcheck_core::types::InvocationResult;
use provcheck_harness::error::InvokeError;
use provcheck_harness::runner::{CommandSpec, ProcessRunner};

/// A recorded invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub unit: PathBuf,
    pub subcommand: String,
    pub args: Vec<String>,
    pub env: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
enum Response {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    SpawnFailure,
}

#[derive(Default)]
struct State {
    responses: Mutex<HashMap<(PathBuf, String), Response>>,
    delays: Mutex<HashMap<(PathBuf, String), Duration>>,
    calls: Mutex<Vec<Call>>,
    interrupted: Mutex<Vec<(PathBuf, String)>>,
    in_flight: Mutex<HashMap<PathBuf, usize>>,
    max_same_unit: AtomicUsize,
    total_in_flight: AtomicUsize,
    max_total: AtomicUsize,
}

/// Cloneable handle; all clones share the same script and call log.
#[derive(Clone, Default)]
pub struct FakeRunner {
    state: Arc<State>,
}

#[allow(dead_code)]
impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(unit: &Path, subcommand: &str) -> (PathBuf, String) {
        (unit.to_path_buf(), subcommand.to_owned())
    }

    /// Makes `subcommand` exit with `code` and `stderr`.
    pub fn fail(&self, unit: &Path, subcommand: &str, code: i32, stderr: &str) -> &Self {
        self.state.responses.lock().unwrap().insert(
            Self::key(unit, subcommand),
            Response::Exit {
                code,
                stdout: String::new(),
                stderr: stderr.to_owned(),
            },
        );
        self
    }

    /// Makes `subcommand` fail to start, as if the binary were missing.
    pub fn spawn_failure(&self, unit: &Path, subcommand: &str) -> &Self {
        self.state
            .responses
            .lock()
            .unwrap()
            .insert(Self::key(unit, subcommand), Response::SpawnFailure);
        self
    }

    /// Scripts the `output -json` listing for `unit`.
    pub fn outputs(&self, unit: &Path, outputs: &[(&str, &str)]) -> &Self {
        self.state.responses.lock().unwrap().insert(
            Self::key(unit, "output"),
            Response::Exit {
                code: 0,
                stdout: crate::helpers::descriptors::output_listing(outputs),
                stderr: String::new(),
            },
        );
        self
    }

    /// Delays `subcommand` before it answers.
    pub fn delay(&self, unit: &Path, subcommand: &str, delay: Duration) -> &Self {
        self.state
            .delays
            .lock()
            .unwrap()
            .insert(Self::key(unit, subcommand), delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Subcommand names invoked for `unit`, in order.
    pub fn sequence(&self, unit: &Path) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.unit == unit)
            .map(|c| c.subcommand)
            .collect()
    }

    /// Subcommands for `unit` that were stopped while running, in order.
    pub fn interrupted(&self, unit: &Path) -> Vec<String> {
        self.state
            .interrupted
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == unit)
            .map(|(_, sub)| sub.clone())
            .collect()
    }

    pub fn count(&self, unit: &Path, subcommand: &str) -> usize {
        self.sequence(unit)
            .iter()
            .filter(|s| *s == subcommand)
            .count()
    }

    /// Highest number of simultaneous calls seen against one unit.
    pub fn max_concurrency_same_unit(&self) -> usize {
        self.state.max_same_unit.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous calls seen overall.
    pub fn max_concurrency_total(&self) -> usize {
        self.state.max_total.load(Ordering::SeqCst)
    }

    fn enter(&self, unit: &Path) {
        let mut in_flight = self.state.in_flight.lock().unwrap();
        let n = in_flight.entry(unit.to_path_buf()).or_default();
        *n += 1;
        self.state.max_same_unit.fetch_max(*n, Ordering::SeqCst);
        let total = self.state.total_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_total.fetch_max(total, Ordering::SeqCst);
    }

    fn leave(&self, unit: &Path) {
        let mut in_flight = self.state.in_flight.lock().unwrap();
        if let Some(n) = in_flight.get_mut(unit) {
            *n -= 1;
        }
        self.state.total_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Decrements in-flight counters even when the call future is dropped.
struct InFlight<'a> {
    runner: &'a FakeRunner,
    unit: &'a Path,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.runner.leave(self.unit);
    }
}

impl ProcessRunner for FakeRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        stop: &CancellationToken,
    ) -> Result<InvocationResult, InvokeError> {
        let subcommand = spec.subcommand().to_owned();
        let key = Self::key(&spec.working_dir, &subcommand);

        self.state.calls.lock().unwrap().push(Call {
            unit: spec.working_dir.clone(),
            subcommand: subcommand.clone(),
            args: spec.args.clone(),
            env: spec.env.clone(),
        });

        self.enter(&spec.working_dir);
        let _in_flight = InFlight {
            runner: self,
            unit: &spec.working_dir,
        };

        let delay = self.state.delays.lock().unwrap().get(&key).copied();
        // always yield so concurrent scenarios interleave
        match delay {
            Some(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stop.cancelled() => {
                        self.state
                            .interrupted
                            .lock()
                            .unwrap()
                            .push(key);
                        return Ok(InvocationResult {
                            exit_code: 130,
                            stdout: String::new(),
                            stderr: "Interrupt received.".to_owned(),
                        });
                    }
                }
            }
            None => tokio::task::yield_now().await,
        }

        let response = self.state.responses.lock().unwrap().get(&key).cloned();
        match response {
            Some(Response::SpawnFailure) => Err(InvokeError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
            }),
            Some(Response::Exit {
                code,
                stdout,
                stderr,
            }) => Ok(InvocationResult {
                exit_code: code,
                stdout,
                stderr,
            }),
            None => Ok(InvocationResult {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            }),
        }
    }
}
