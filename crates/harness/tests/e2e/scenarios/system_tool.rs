//! S8: full lifecycle through `SystemRunner` against a stand-in tool script.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use provcheck_core::types::{ConfigurationDescriptor, Stage};
use provcheck_harness::invoker::ToolInvoker;
use provcheck_harness::lifecycle::{DestroyStatus, LifecycleRunner, StageTimeouts};
use provcheck_harness::orchestrator::Orchestrator;
use provcheck_harness::runner::SystemRunner;
use provcheck_harness::scenario::{Check, Scenario};

/// Records each subcommand in `calls.log` inside the unit directory and
/// answers `output -json` with a vpc_id. `apply` fails when FAIL_APPLY is set
/// and hangs until interrupted when SLOW_APPLY is set.
const FAKE_TOOL: &str = r#"#!/bin/sh
echo "$1 region=$AWS_DEFAULT_REGION" >> calls.log
case "$1" in
  apply)
    if [ -n "$FAIL_APPLY" ]; then
      echo "Error: simulated apply failure" >&2
      exit 1
    fi
    if [ -n "$SLOW_APPLY" ]; then
      trap 'echo "apply saving state" >> calls.log; kill $! 2>/dev/null; exit 130' INT
      sleep 30 >/dev/null 2>&1 &
      wait
    fi
    ;;
  output)
    printf '{"vpc_id":{"sensitive":false,"type":"string","value":"vpc-0a1b2c3d"}}'
    ;;
esac
exit 0
"#;

fn install_tool(dir: &Path) -> PathBuf {
    let tool = dir.join("fake-terraform");
    std::fs::write(&tool, FAKE_TOOL).unwrap();
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
    tool
}

fn unit_dir(root: &Path) -> PathBuf {
    let unit = root.join("network").join("vpc");
    std::fs::create_dir_all(&unit).unwrap();
    unit
}

fn calls(unit: &Path) -> Vec<String> {
    std::fs::read_to_string(unit.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_owned)
        .collect()
}

fn orchestrator(tool: &Path) -> Orchestrator<SystemRunner> {
    let invoker = ToolInvoker::new(SystemRunner::new(), tool.display().to_string());
    Orchestrator::new(LifecycleRunner::new(invoker))
}

#[tokio::test]
async fn test_e2e_real_process_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let tool = install_tool(dir.path());
    let unit = unit_dir(dir.path());

    let scenario = Scenario::new(
        "vpc",
        ConfigurationDescriptor::builder(&unit)
            .variable("environment", "test")
            .env("AWS_DEFAULT_REGION", "eu-west-2")
            .build(),
    )
    .with_check(Check::non_empty("vpc_id"));

    let results = orchestrator(&tool).run_all(vec![scenario]).await;

    assert!(results[0].passed, "{:?}", results[0].error);
    assert_eq!(results[0].destroy, DestroyStatus::Succeeded);
    assert_eq!(
        calls(&unit),
        vec![
            "init region=eu-west-2",
            "apply region=eu-west-2",
            "output region=eu-west-2",
            "destroy region=eu-west-2",
        ]
    );
}

#[tokio::test]
async fn test_e2e_real_process_apply_failure_destroys() {
    let dir = tempfile::tempdir().unwrap();
    let tool = install_tool(dir.path());
    let unit = unit_dir(dir.path());

    let scenario = Scenario::new(
        "vpc",
        ConfigurationDescriptor::builder(&unit)
            .env("FAIL_APPLY", "1")
            .env("AWS_DEFAULT_REGION", "eu-west-2")
            .build(),
    )
    .with_check(Check::non_empty("vpc_id"));

    let results = orchestrator(&tool).run_all(vec![scenario]).await;

    assert_eq!(results[0].failed_stage, Some(Stage::Apply));
    let error = results[0].error.as_deref().unwrap_or_default();
    assert!(error.contains("simulated apply failure"), "{error}");
    let subcommands: Vec<String> = calls(&unit)
        .iter()
        .filter_map(|l| l.split_whitespace().next().map(str::to_owned))
        .collect();
    assert_eq!(subcommands, vec!["init", "apply", "destroy"]);
}

#[tokio::test]
async fn test_e2e_real_process_apply_timeout_lets_tool_save_state_before_destroy() {
    // Given: an apply that never finishes on its own
    let dir = tempfile::tempdir().unwrap();
    let tool = install_tool(dir.path());
    let unit = unit_dir(dir.path());
    let descriptor = ConfigurationDescriptor::builder(&unit)
        .env("SLOW_APPLY", "1")
        .env("AWS_DEFAULT_REGION", "eu-west-2")
        .build();

    let invoker = ToolInvoker::new(
        SystemRunner::with_grace(Duration::from_secs(10)),
        tool.display().to_string(),
    );
    let lifecycle = LifecycleRunner::new(invoker).with_timeouts(StageTimeouts {
        apply: Duration::from_secs(1),
        ..StageTimeouts::default()
    });

    // When: apply hits its timeout
    let report = lifecycle
        .with_provisioned(&descriptor, &CancellationToken::new(), |_| async { Ok(()) })
        .await;

    // Then: the tool handled the interrupt before destroy ran
    assert_eq!(
        report.outcome.as_ref().unwrap_err().stage(),
        Some(Stage::Apply)
    );
    assert_eq!(report.destroy_status(), DestroyStatus::Succeeded);
    assert_eq!(
        calls(&unit),
        vec![
            "init region=eu-west-2",
            "apply region=eu-west-2",
            "apply saving state",
            "destroy region=eu-west-2",
        ]
    );
}
