//! S3: apply succeeds but `db_endpoint` is not among the outputs.

use crate::helpers::descriptors::*;
use crate::helpers::fake_runner::FakeRunner;

use provcheck_core::types::Stage;
use provcheck_harness::error::ValidationError;
use provcheck_harness::lifecycle::DestroyStatus;
use provcheck_harness::scenario::{Check, Scenario};

#[tokio::test]
async fn test_e2e_missing_db_endpoint_fails_validate_and_destroys() {
    // Given: rds outputs lack db_endpoint
    let runner = FakeRunner::new();
    runner.outputs(unit(RDS_UNIT), &[("db_port", "5432")]);

    // When
    let results = orchestrator(&runner).run_all(vec![rds_scenario()]).await;

    // Then
    let result = &results[0];
    assert!(!result.passed);
    assert_eq!(result.failed_stage, Some(Stage::Validate));
    assert_eq!(
        result.checks[0].error,
        Some(ValidationError::MissingOutput {
            name: "db_endpoint".to_owned()
        })
    );
    assert_eq!(result.destroy, DestroyStatus::Succeeded);
    assert_eq!(runner.count(unit(RDS_UNIT), "destroy"), 1);
}

#[tokio::test]
async fn test_e2e_empty_output_is_check_failure_not_missing() {
    let runner = FakeRunner::new();
    runner.outputs(unit(RDS_UNIT), &[("db_endpoint", "")]);

    let results = orchestrator(&runner).run_all(vec![rds_scenario()]).await;
    let result = &results[0];

    assert_eq!(result.failed_stage, Some(Stage::Validate));
    assert!(matches!(
        result.checks[0].error,
        Some(ValidationError::CheckFailure { .. })
    ));
}

#[tokio::test]
async fn test_e2e_all_checks_reported_even_after_first_failure() {
    let runner = FakeRunner::new();
    runner.outputs(unit(RDS_UNIT), &[("db_endpoint", "db.internal:5432")]);

    let scenario = Scenario::new("rds", descriptor(RDS_UNIT))
        .with_check(Check::non_empty("db_port"))
        .with_check(Check::non_empty("db_endpoint"))
        .with_check(Check::non_empty("db_name"));

    let results = orchestrator(&runner).run_all(vec![scenario]).await;
    let result = &results[0];

    let passed: Vec<bool> = result.checks.iter().map(|c| c.passed).collect();
    assert_eq!(passed, vec![false, true, false]);
    let error = result.error.as_deref().unwrap_or_default();
    assert!(error.contains("db_port"), "first failure is primary: {error}");
    assert_eq!(result.failed_checks().count(), 2);
}
