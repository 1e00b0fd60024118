//! 하네스 에러 타입
//!
//! [`InvokeError`]는 외부 도구 1회 호출의 실패를, [`HarnessError`]는 그 실패가
//! 라이프사이클의 어느 단계에서 발생했는지를 표현합니다.
//! [`ValidationError`]는 출력 검증 실패를 나타냅니다.

use std::time::Duration;

use serde::Serialize;

use provcheck_core::error::ConfigError;
use provcheck_core::types::Stage;

/// 외부 도구 호출 에러
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// 프로세스를 시작할 수 없음 (바이너리 없음, 권한 없음, 작업 디렉토리 없음)
    #[error("failed to start '{program}': {source}")]
    Spawn {
        /// 실행하려던 프로그램
        program: String,
        /// 원인
        #[source]
        source: std::io::Error,
    },

    /// 시작된 프로세스의 종료를 기다리지 못함
    #[error("failed to wait for '{program}': {source}")]
    Wait {
        /// 실행 중이던 프로그램
        program: String,
        /// 원인
        #[source]
        source: std::io::Error,
    },

    /// 프로세스가 0이 아닌 코드로 종료
    #[error("'{subcommand}' exited with code {exit_code}: {stderr}")]
    Execution {
        /// 서브커맨드 이름
        subcommand: String,
        /// 종료 코드
        exit_code: i32,
        /// 표준 에러 (앞뒤 공백 제거)
        stderr: String,
    },

    /// 단계 타임아웃 초과 (프로세스는 종료됨)
    #[error("'{subcommand}' timed out after {after:?}")]
    Timeout {
        /// 서브커맨드 이름
        subcommand: String,
        /// 적용된 타임아웃
        after: Duration,
    },

    /// 호출자가 취소함 (프로세스는 종료됨)
    #[error("'{subcommand}' was cancelled")]
    Cancelled {
        /// 서브커맨드 이름
        subcommand: String,
    },
}

impl InvokeError {
    /// 프로세스가 시작조차 되지 않았는지 여부
    pub fn never_started(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }
}

/// 출력 검증 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// 요청한 출력이 출력 집합에 없음
    #[error("output '{name}' is missing")]
    MissingOutput {
        /// 출력 이름
        name: String,
    },

    /// 출력은 있으나 술어를 만족하지 않음
    #[error("check failed for output '{name}': {reason}")]
    CheckFailure {
        /// 출력 이름
        name: String,
        /// 실패 사유
        reason: String,
    },
}

/// 하네스 도메인 에러
///
/// 단계 정보는 [`HarnessError::stage`]로 얻습니다.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// 시나리오 구성 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// init 실패: 리소스가 생성되지 않았으므로 정리 불필요
    #[error("init failed: {0}")]
    Init(#[source] InvokeError),

    /// apply 실패: destroy가 반드시 뒤따름
    #[error("apply failed: {0}")]
    Apply(#[source] InvokeError),

    /// output 호출 실패
    #[error("failed to read outputs: {0}")]
    Outputs(#[source] InvokeError),

    /// output 결과 형식이 잘못됨
    #[error("malformed output listing: {reason}")]
    OutputFormat {
        /// 파싱 실패 사유
        reason: String,
    },

    /// 출력 검증 실패
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// 검증 본문에서 panic 발생
    #[error("scenario body panicked: {0}")]
    Panicked(String),

    /// 검증 본문 타임아웃
    #[error("scenario body timed out after {after:?}")]
    TimedOut {
        /// 적용된 타임아웃
        after: Duration,
    },

    /// 검증 본문 실행 중 취소됨
    #[error("scenario cancelled")]
    Cancelled,

    /// destroy 실패: 리소스가 남아 있을 수 있음
    #[error("destroy failed: {0}")]
    Destroy(#[source] InvokeError),

    /// 주 에러 이후 destroy도 실패
    #[error("{primary}; destroy also failed: {cleanup}")]
    WithCleanup {
        /// 주 원인
        primary: Box<HarnessError>,
        /// 정리 단계 에러
        cleanup: Box<HarnessError>,
    },
}

impl HarnessError {
    /// 에러가 발생한 라이프사이클 단계
    ///
    /// `WithCleanup`은 주 원인의 단계를 반환합니다. 구성 에러는 단계가 없습니다.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Config(_) => None,
            Self::Init(_) => Some(Stage::Init),
            Self::Apply(_) => Some(Stage::Apply),
            Self::Outputs(_) | Self::OutputFormat { .. } => Some(Stage::Outputs),
            Self::Validation(_) | Self::Panicked(_) | Self::TimedOut { .. } | Self::Cancelled => {
                Some(Stage::Validate)
            }
            Self::Destroy(_) => Some(Stage::Destroy),
            Self::WithCleanup { primary, .. } => primary.stage(),
        }
    }

    /// 취소로 인한 에러인지 여부
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Init(e) | Self::Apply(e) | Self::Outputs(e) | Self::Destroy(e) => {
                matches!(e, InvokeError::Cancelled { .. })
            }
            Self::WithCleanup { primary, .. } => primary.is_cancelled(),
            _ => false,
        }
    }
}
