//! Descriptor, scenario and harness factories shared by E2E tests.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use provcheck_core::types::ConfigurationDescriptor;
use provcheck_harness::invoker::ToolInvoker;
use provcheck_harness::lifecycle::{LifecycleRunner, StageTimeouts};
use provcheck_harness::orchestrator::Orchestrator;
use provcheck_harness::scenario::{Check, Scenario};

use super::fake_runner::FakeRunner;

pub const VPC_UNIT: &str = "network/vpc";
pub const RDS_UNIT: &str = "database/rds";
pub const SG_UNIT: &str = "network/security_groups";

#[allow(dead_code)]
pub fn unit(path: &str) -> &Path {
    Path::new(path)
}

/// Descriptor with the shared test variables and region override.
pub fn descriptor(unit_path: &str) -> ConfigurationDescriptor {
    ConfigurationDescriptor::builder(unit_path)
        .variable("environment", "test")
        .env("AWS_DEFAULT_REGION", "eu-west-2")
        .build()
}

#[allow(dead_code)]
pub fn vpc_scenario() -> Scenario {
    Scenario::new("vpc", descriptor(VPC_UNIT)).with_check(Check::non_empty("vpc_id"))
}

#[allow(dead_code)]
pub fn rds_scenario() -> Scenario {
    Scenario::new("rds", descriptor(RDS_UNIT)).with_check(Check::non_empty("db_endpoint"))
}

#[allow(dead_code)]
pub fn security_groups_scenario() -> Scenario {
    Scenario::new("security_groups", descriptor(SG_UNIT))
        .with_check(Check::non_empty("security_group_id"))
}

/// `output -json` listing with string values.
pub fn output_listing(outputs: &[(&str, &str)]) -> String {
    let listing: BTreeMap<&str, serde_json::Value> = outputs
        .iter()
        .map(|(name, value)| {
            (
                *name,
                serde_json::json!({ "sensitive": false, "type": "string", "value": value }),
            )
        })
        .collect();
    serde_json::to_string(&listing).unwrap()
}

#[allow(dead_code)]
pub fn lifecycle(runner: &FakeRunner) -> LifecycleRunner<FakeRunner> {
    LifecycleRunner::new(ToolInvoker::new(runner.clone(), "terraform"))
}

#[allow(dead_code)]
pub fn lifecycle_with_body_timeout(
    runner: &FakeRunner,
    body: Duration,
) -> LifecycleRunner<FakeRunner> {
    lifecycle(runner).with_timeouts(StageTimeouts {
        body: Some(body),
        ..StageTimeouts::default()
    })
}

#[allow(dead_code)]
pub fn orchestrator(runner: &FakeRunner) -> Orchestrator<FakeRunner> {
    Orchestrator::new(lifecycle(runner))
}
