//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 하네스는 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않았다면 기록은 무시됩니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `provcheck_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)

use metrics::{describe_counter, describe_histogram};

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 서브커맨드 레이블 키 (init, apply, destroy, output)
pub const LABEL_SUBCOMMAND: &str = "subcommand";

/// 단계 레이블 키 (init, apply, outputs, validate, destroy)
pub const LABEL_STAGE: &str = "stage";

// ─── 메트릭 이름 ────────────────────────────────────────────────────

/// 완료된 시나리오 수 (counter, label: result)
pub const SCENARIOS_TOTAL: &str = "provcheck_scenarios_total";

/// 외부 도구 호출 수 (counter, labels: subcommand, result)
pub const INVOCATIONS_TOTAL: &str = "provcheck_invocations_total";

/// 단계별 소요 시간 (histogram, 초, label: stage)
pub const STAGE_DURATION_SECONDS: &str = "provcheck_stage_duration_seconds";

/// destroy 실패 수 (counter): 리소스가 남아 있을 수 있음을 뜻함
pub const DESTROY_FAILURES_TOTAL: &str = "provcheck_destroy_failures_total";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    describe_counter!(SCENARIOS_TOTAL, "Number of scenarios completed");
    describe_counter!(
        INVOCATIONS_TOTAL,
        "Number of provisioning tool invocations"
    );
    describe_histogram!(
        STAGE_DURATION_SECONDS,
        "Time spent in each lifecycle stage in seconds"
    );
    describe_counter!(
        DESTROY_FAILURES_TOTAL,
        "Number of destroy invocations that failed and may have leaked resources"
    );
}
