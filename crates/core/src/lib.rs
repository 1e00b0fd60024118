//! provcheck 공통 크레이트
//!
//! 모든 provcheck 크레이트가 공유하는 도메인 타입, 에러, 설정, 메트릭 이름을
//! 정의합니다.
//!
//! - [`config`]: `provcheck.toml` 로딩/검증 (`ProvcheckConfig`)
//! - [`error`]: 공통 에러 (`ProvcheckError`, `ConfigError`)
//! - [`metrics`]: 메트릭 이름 상수
//! - [`types`]: 디스크립터, 실행 결과, 출력 집합, 단계

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ProvcheckError};

// 설정
pub use config::{CheckConfig, ProvcheckConfig, ScenarioConfig};

// 도메인 타입
pub use types::{ConfigurationDescriptor, DescriptorBuilder, InvocationResult, OutputSet, Stage};
