//! E2E tests for provcheck-harness.
//!
//! These tests drive the orchestrator and lifecycle runner against a scripted
//! process runner and check the resource-safety guarantees: destroy after any
//! apply attempt, failure isolation between scenarios, and per-unit exclusion.
//!
//! # Test Structure
//!
//! - `helpers/` -- Fake runner, descriptor and scenario factories
//! - `scenarios/` -- Test files organized by scenario
//!
//! # Running
//!
//! ```bash
//! cargo test -p provcheck-harness --test e2e
//! ```

mod scenarios;
