//! S1: vpc applies and passes its check; the destroy that follows fails.
//!
//! The failed destroy is reported but does not change the already-recorded
//! pass for `vpc_id`.

use crate::helpers::descriptors::*;
use crate::helpers::fake_runner::FakeRunner;

use provcheck_core::types::Stage;
use provcheck_harness::lifecycle::DestroyStatus;

#[tokio::test]
async fn test_e2e_vpc_passes_check_and_reports_destroy_failure() {
    // Given: vpc apply succeeds with a vpc_id, destroy fails
    let runner = FakeRunner::new();
    runner
        .outputs(unit(VPC_UNIT), &[("vpc_id", "vpc-0a1b2c3d")])
        .fail(unit(VPC_UNIT), "destroy", 1, "Error: DependencyViolation");

    // When
    let results = orchestrator(&runner).run_all(vec![vpc_scenario()]).await;

    // Then: the vpc_id check passed
    let result = &results[0];
    assert_eq!(result.name, "vpc");
    assert_eq!(result.checks.len(), 1);
    assert_eq!(result.checks[0].output, "vpc_id");
    assert!(result.checks[0].passed, "vpc_id check should stay passed");
    assert!(result.checks[0].error.is_none());

    // Then: destroy ran once and its failure is surfaced
    assert_eq!(
        runner.sequence(unit(VPC_UNIT)),
        vec!["init", "apply", "output", "destroy"]
    );
    match &result.destroy {
        DestroyStatus::Failed { reason } => {
            assert!(reason.contains("DependencyViolation"), "{reason}");
        }
        other => panic!("expected destroy failure, got {other:?}"),
    }
    assert!(!result.passed);
    assert_eq!(result.failed_stage, Some(Stage::Destroy));
}

#[tokio::test]
async fn test_e2e_vpc_invocation_carries_variables_and_region() {
    let runner = FakeRunner::new();
    runner.outputs(unit(VPC_UNIT), &[("vpc_id", "vpc-0a1b2c3d")]);

    let results = orchestrator(&runner).run_all(vec![vpc_scenario()]).await;
    assert!(results[0].passed, "{:?}", results[0].error);
    assert_eq!(results[0].destroy, DestroyStatus::Succeeded);

    let calls = runner.calls();
    let apply = calls
        .iter()
        .find(|c| c.subcommand == "apply")
        .expect("apply invoked");
    assert!(apply.args.contains(&"environment=test".to_owned()));
    assert_eq!(apply.env["AWS_DEFAULT_REGION"], "eu-west-2");

    let destroy = calls
        .iter()
        .find(|c| c.subcommand == "destroy")
        .expect("destroy invoked");
    assert!(destroy.args.contains(&"environment=test".to_owned()));
}
