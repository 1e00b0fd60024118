//! Provisioning lifecycle harness.
//!
//! Applies a provisioning unit through an external Terraform-compatible tool,
//! reads its outputs, validates them, and tears the unit down again on every
//! exit path.
//!
//! # Module Structure
//!
//! - [`runner`]: Process execution seam (`ProcessRunner` trait, `SystemRunner`)
//! - [`invoker`]: Tool argument construction and invocation (`ToolInvoker`)
//! - [`lock`]: Per-unit mutual exclusion (`UnitLocks`)
//! - [`lifecycle`]: init/apply/outputs/destroy sequencing (`LifecycleRunner`)
//! - [`validator`]: Output predicates (`Predicate`, `validate`)
//! - [`scenario`]: Scenario definitions (`Scenario`, `Check`)
//! - [`orchestrator`]: Scenario execution and reporting (`Orchestrator`)
//! - [`error`]: Error types (`InvokeError`, `HarnessError`, `ValidationError`)
//!
//! # Architecture
//!
//! ```text
//! Orchestrator ──spawn per scenario──► LifecycleRunner.with_provisioned()
//!                                          │
//!                                     ToolInvoker ──► ProcessRunner ──► terraform
//!                                          │
//!                                     validate(outputs) ──► CheckResult
//!                                          │
//!                                     destroy (always) ──► ScenarioResult
//! ```

pub mod error;
pub mod invoker;
pub mod lifecycle;
pub mod lock;
pub mod orchestrator;
pub mod runner;
pub mod scenario;
pub mod validator;

// --- Public API Re-exports ---

// Errors
pub use error::{HarnessError, InvokeError, ValidationError};

// Process execution
pub use invoker::{Subcommand, ToolInvoker};
pub use runner::{CommandSpec, ProcessRunner, SystemRunner};

// Lifecycle
pub use lifecycle::{DestroyStatus, LifecycleReport, LifecycleRunner, StageTimeouts};
pub use lock::UnitLocks;

// Validation and orchestration
pub use orchestrator::{CheckResult, Orchestrator, RunSummary, ScenarioResult};
pub use scenario::{Check, Scenario};
pub use validator::{Predicate, validate};
