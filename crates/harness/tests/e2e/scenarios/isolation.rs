//! S5: scenario isolation and per-unit mutual exclusion.

use std::time::Duration;

use crate::helpers::descriptors::*;
use crate::helpers::fake_runner::FakeRunner;

use provcheck_core::types::Stage;
use provcheck_harness::orchestrator::RunSummary;
use provcheck_harness::scenario::{Check, Scenario};

fn all_reference_outputs(runner: &FakeRunner) {
    runner
        .outputs(unit(VPC_UNIT), &[("vpc_id", "vpc-0a1b2c3d")])
        .outputs(unit(RDS_UNIT), &[("db_endpoint", "rds.internal:5432")])
        .outputs(unit(SG_UNIT), &[("security_group_id", "sg-0123")]);
}

#[tokio::test]
async fn test_e2e_all_reference_scenarios_pass() {
    let runner = FakeRunner::new();
    all_reference_outputs(&runner);

    let results = orchestrator(&runner)
        .run_all(vec![vpc_scenario(), rds_scenario(), security_groups_scenario()])
        .await;
    let summary = RunSummary::new(results);

    assert!(summary.all_passed());
    assert_eq!(summary.total, 3);
    for unit_path in [VPC_UNIT, RDS_UNIT, SG_UNIT] {
        assert_eq!(runner.count(unit(unit_path), "destroy"), 1, "{unit_path}");
    }
}

#[tokio::test]
async fn test_e2e_failure_in_one_scenario_does_not_affect_others() {
    // Given: rds apply fails, the other two are healthy
    let runner = FakeRunner::new();
    all_reference_outputs(&runner);
    runner.fail(unit(RDS_UNIT), "apply", 1, "Error: InvalidParameterCombination");

    // When
    let results = orchestrator(&runner)
        .with_max_parallel(3)
        .run_all(vec![vpc_scenario(), rds_scenario(), security_groups_scenario()])
        .await;

    // Then: results keep input order, only rds failed
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["vpc", "rds", "security_groups"]);
    assert!(results[0].passed);
    assert!(!results[1].passed);
    assert_eq!(results[1].failed_stage, Some(Stage::Apply));
    assert!(results[2].passed);

    let summary = RunSummary::new(results);
    assert_eq!(summary.failed, 1);
    assert!(!summary.all_passed());
}

#[tokio::test]
async fn test_e2e_each_scenario_gets_its_own_run_id() {
    let runner = FakeRunner::new();
    all_reference_outputs(&runner);

    let results = orchestrator(&runner)
        .run_all(vec![vpc_scenario(), rds_scenario()])
        .await;
    assert_ne!(results[0].run_id, results[1].run_id);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_same_unit_never_overlaps() {
    // Given: two scenarios against the same unit with slow applies
    let runner = FakeRunner::new();
    runner
        .outputs(unit(VPC_UNIT), &[("vpc_id", "vpc-0a1b2c3d")])
        .delay(unit(VPC_UNIT), "apply", Duration::from_secs(120));

    let first = vpc_scenario();
    let second = Scenario::new("vpc_again", descriptor(VPC_UNIT))
        .with_check(Check::non_empty("vpc_id"));

    // When: run with room for both in parallel
    let results = orchestrator(&runner)
        .with_max_parallel(4)
        .run_all(vec![first, second])
        .await;

    // Then: both pass, but their lifecycles were serialised
    assert!(results.iter().all(|r| r.passed));
    assert_eq!(runner.max_concurrency_same_unit(), 1);
    assert_eq!(
        runner.sequence(unit(VPC_UNIT)),
        vec![
            "init", "apply", "output", "destroy", "init", "apply", "output", "destroy"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_e2e_distinct_units_run_in_parallel() {
    let runner = FakeRunner::new();
    all_reference_outputs(&runner);
    for unit_path in [VPC_UNIT, RDS_UNIT, SG_UNIT] {
        runner.delay(unit(unit_path), "apply", Duration::from_secs(60));
    }

    let results = orchestrator(&runner)
        .with_max_parallel(3)
        .run_all(vec![vpc_scenario(), rds_scenario(), security_groups_scenario()])
        .await;

    assert!(results.iter().all(|r| r.passed));
    assert!(
        runner.max_concurrency_total() >= 2,
        "independent units should overlap"
    );
}

#[tokio::test(start_paused = true)]
async fn test_e2e_max_parallel_one_runs_sequentially() {
    let runner = FakeRunner::new();
    all_reference_outputs(&runner);
    for unit_path in [VPC_UNIT, RDS_UNIT, SG_UNIT] {
        runner.delay(unit(unit_path), "apply", Duration::from_secs(60));
    }

    let results = orchestrator(&runner)
        .run_all(vec![vpc_scenario(), rds_scenario(), security_groups_scenario()])
        .await;

    assert!(results.iter().all(|r| r.passed));
    assert_eq!(runner.max_concurrency_total(), 1);
}
