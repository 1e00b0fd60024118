//! S4: init fails; nothing was created, so neither apply nor destroy runs.

use crate::helpers::descriptors::*;
use crate::helpers::fake_runner::FakeRunner;

use provcheck_core::types::Stage;
use provcheck_harness::lifecycle::DestroyStatus;

#[tokio::test]
async fn test_e2e_init_failure_skips_apply_and_destroy() {
    let runner = FakeRunner::new();
    runner.fail(
        unit(SG_UNIT),
        "init",
        1,
        "Error: Failed to query available provider packages",
    );

    let results = orchestrator(&runner)
        .run_all(vec![security_groups_scenario()])
        .await;
    let result = &results[0];

    assert!(!result.passed);
    assert_eq!(result.failed_stage, Some(Stage::Init));
    assert_eq!(result.destroy, DestroyStatus::NotRequired);
    assert_eq!(runner.sequence(unit(SG_UNIT)), vec!["init"]);
}

#[tokio::test]
async fn test_e2e_missing_binary_reports_init_stage() {
    let runner = FakeRunner::new();
    runner.spawn_failure(unit(SG_UNIT), "init");

    let results = orchestrator(&runner)
        .run_all(vec![security_groups_scenario()])
        .await;
    let result = &results[0];

    assert_eq!(result.failed_stage, Some(Stage::Init));
    let error = result.error.as_deref().unwrap_or_default();
    assert!(error.contains("failed to start 'terraform'"), "{error}");
    assert_eq!(runner.count(unit(SG_UNIT), "destroy"), 0);
}
