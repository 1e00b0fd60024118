//! 에러 타입: 설정 및 공통 에러 정의
//!
//! 프로비저닝 단계별 에러(init/apply/destroy 등)는 `provcheck-harness`가
//! 정의합니다. 이 모듈은 모든 크레이트가 공유하는 최상위 에러만 다룹니다.

/// provcheck 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ProvcheckError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    /// `InvalidValue` 생성 헬퍼
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
