//! 테스트 오케스트레이터: 시나리오를 독립적으로 실행하고 결과를 보고
//!
//! 각 시나리오는 별도 tokio 태스크에서 실행되며, 세마포어로 동시 실행 수를
//! 제한합니다. 한 시나리오의 실패(또는 panic)는 다른 시나리오에 영향을 주지
//! 않습니다. 결과는 입력 순서대로 반환됩니다.
//!
//! 오케스트레이터는 재시도하지 않습니다. 프로비저닝은 부작용이 있으므로
//! 재시도는 운영자가 명시적으로 수행합니다.

use std::sync::Arc;
use std::time::Instant;

use metrics::counter;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use provcheck_core::metrics::{LABEL_RESULT, SCENARIOS_TOTAL};
use provcheck_core::types::{OutputSet, Stage};

use crate::error::{HarnessError, ValidationError};
use crate::lifecycle::{DestroyStatus, LifecycleRunner};
use crate::runner::ProcessRunner;
use crate::scenario::{Check, Scenario};
use crate::validator::validate;

/// 검사 1건의 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    /// 출력 이름
    pub output: String,
    /// 술어 표시 이름
    pub predicate: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationError>,
}

/// 시나리오 1건의 결과
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    /// 로그 상관관계용 실행 ID
    pub run_id: String,
    pub passed: bool,
    /// 실패한 라이프사이클 단계
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    /// 실패 원인 (주 원인이 먼저)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 선언 순서대로의 검사 결과. 출력을 읽기 전에 실패했다면 비어 있음
    pub checks: Vec<CheckResult>,
    pub destroy: DestroyStatus,
    pub duration_ms: u64,
}

impl ScenarioResult {
    /// 실행 전에 실패한 시나리오 (취소, 태스크 중단)
    fn not_run(name: String, run_id: String, reason: String) -> Self {
        Self {
            name,
            run_id,
            passed: false,
            failed_stage: None,
            error: Some(reason),
            checks: Vec::new(),
            destroy: DestroyStatus::NotRequired,
            duration_ms: 0,
        }
    }

    /// 실패한 검사 목록
    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// 전체 실행 요약
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ScenarioResult>,
}

impl RunSummary {
    pub fn new(results: Vec<ScenarioResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            results,
        }
    }

    /// 모든 시나리오가 통과했는지 여부 (프로세스 종료 코드 결정에 사용)
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// destroy가 실패한 시나리오 (리소스 누수 가능)
    pub fn leaked(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| r.destroy.is_failed())
    }
}

/// 테스트 오케스트레이터
pub struct Orchestrator<R: ProcessRunner> {
    lifecycle: Arc<LifecycleRunner<R>>,
    max_parallel: usize,
    cancel: CancellationToken,
}

impl<R: ProcessRunner> Orchestrator<R> {
    /// 기본값: 순차 실행, 취소 없음
    pub fn new(lifecycle: LifecycleRunner<R>) -> Self {
        Self {
            lifecycle: Arc::new(lifecycle),
            max_parallel: 1,
            cancel: CancellationToken::new(),
        }
    }

    /// 동시 실행 수를 설정합니다 (최소 1).
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// 외부 취소 토큰을 연결합니다.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 모든 시나리오를 실행하고 입력 순서대로 결과를 반환합니다.
    pub async fn run_all(&self, scenarios: Vec<Scenario>) -> Vec<ScenarioResult> {
        info!(
            scenarios = scenarios.len(),
            max_parallel = self.max_parallel,
            "running scenarios"
        );
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));

        let handles: Vec<_> = scenarios
            .into_iter()
            .map(|scenario| {
                let name = scenario.name.clone();
                let lifecycle = Arc::clone(&self.lifecycle);
                let semaphore = Arc::clone(&semaphore);
                let cancel = self.cancel.clone();

                let handle = tokio::spawn(async move {
                    // 세마포어는 닫히지 않음
                    let _permit = semaphore.acquire_owned().await.ok();
                    execute(&lifecycle, &scenario, &cancel).await
                });
                (name, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!(scenario = %name, error = %e, "scenario task aborted");
                    counter!(SCENARIOS_TOTAL, LABEL_RESULT => "failure").increment(1);
                    results.push(ScenarioResult::not_run(
                        name,
                        Uuid::new_v4().to_string(),
                        format!("scenario task aborted: {e}"),
                    ));
                }
            }
        }
        results
    }

    /// 시나리오 하나를 현재 태스크에서 실행합니다.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        execute(&self.lifecycle, scenario, &self.cancel).await
    }
}

async fn execute<R: ProcessRunner>(
    lifecycle: &LifecycleRunner<R>,
    scenario: &Scenario,
    cancel: &CancellationToken,
) -> ScenarioResult {
    let run_id = Uuid::new_v4().to_string();
    let span = info_span!("scenario", scenario = %scenario.name, run_id = %run_id);

    async move {
        if cancel.is_cancelled() {
            warn!("cancelled before start");
            counter!(SCENARIOS_TOTAL, LABEL_RESULT => "failure").increment(1);
            return ScenarioResult::not_run(
                scenario.name.clone(),
                run_id,
                "cancelled before start".to_owned(),
            );
        }

        info!(unit = %scenario.descriptor, checks = scenario.checks.len(), "scenario started");
        let started = Instant::now();

        let report = lifecycle
            .with_provisioned(&scenario.descriptor, cancel, |outputs| async move {
                Ok(evaluate_checks(&scenario.checks, &outputs))
            })
            .await;

        let destroy = report.destroy_status();
        let (checks, primary) = match report.outcome {
            Ok(checks) => {
                // 모든 검사를 평가한 뒤 첫 실패를 대표 원인으로 사용
                let first_failure = checks
                    .iter()
                    .find_map(|c| c.error.clone())
                    .map(HarnessError::Validation);
                (checks, first_failure)
            }
            Err(e) => (Vec::new(), Some(e)),
        };
        let cleanup = match report.destroy {
            Some(Err(e)) => Some(e),
            _ => None,
        };
        let failure = match (primary, cleanup) {
            (Some(primary), Some(cleanup)) => Some(HarnessError::WithCleanup {
                primary: Box::new(primary),
                cleanup: Box::new(cleanup),
            }),
            (primary, cleanup) => primary.or(cleanup),
        };

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = ScenarioResult {
            name: scenario.name.clone(),
            run_id,
            passed: failure.is_none(),
            failed_stage: failure.as_ref().and_then(HarnessError::stage),
            error: failure.as_ref().map(ToString::to_string),
            checks,
            destroy,
            duration_ms,
        };

        if result.passed {
            info!(duration_ms, "scenario passed");
            counter!(SCENARIOS_TOTAL, LABEL_RESULT => "success").increment(1);
        } else {
            warn!(
                duration_ms,
                stage = ?result.failed_stage,
                error = result.error.as_deref().unwrap_or_default(),
                "scenario failed"
            );
            counter!(SCENARIOS_TOTAL, LABEL_RESULT => "failure").increment(1);
        }
        result
    }
    .instrument(span)
    .await
}

/// 모든 검사를 선언 순서대로 평가합니다 (단락 평가 없음).
pub fn evaluate_checks(checks: &[Check], outputs: &OutputSet) -> Vec<CheckResult> {
    checks
        .iter()
        .map(|check| {
            let error = validate(outputs, &check.output, &check.predicate).err();
            CheckResult {
                output: check.output.clone(),
                predicate: check.predicate.to_string(),
                passed: error.is_none(),
                error,
            }
        })
        .collect()
}
