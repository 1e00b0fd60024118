//! 시나리오 정의: 디스크립터와 출력 검사 목록의 묶음
//!
//! 시나리오는 시작 시 생성되며 이후 변경되지 않습니다.

use provcheck_core::config::{ProvcheckConfig, ScenarioConfig};
use provcheck_core::error::ConfigError;
use provcheck_core::types::ConfigurationDescriptor;

use crate::validator::Predicate;

/// 출력 하나에 대한 검사
#[derive(Debug, Clone)]
pub struct Check {
    /// 출력 이름
    pub output: String,
    /// 술어
    pub predicate: Predicate,
}

impl Check {
    pub fn new(output: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            output: output.into(),
            predicate,
        }
    }

    /// `non_empty` 검사
    pub fn non_empty(output: impl Into<String>) -> Self {
        Self::new(output, Predicate::NonEmpty)
    }
}

/// 검증 대상 인프라 유닛 하나
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub descriptor: ConfigurationDescriptor,
    /// 선언 순서대로 평가됩니다.
    pub checks: Vec<Check>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, descriptor: ConfigurationDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            checks: Vec::new(),
        }
    }

    /// 검사를 추가합니다.
    pub fn with_check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// 설정 파일의 시나리오 항목으로부터 생성합니다.
    ///
    /// `[defaults]`와 `run.root_dir`가 반영된 디스크립터를 사용합니다.
    pub fn from_config(
        config: &ProvcheckConfig,
        scenario: &ScenarioConfig,
    ) -> Result<Self, ConfigError> {
        let checks = scenario
            .checks
            .iter()
            .map(|c| Predicate::from_config(c).map(|p| Check::new(&c.output, p)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: scenario.name.clone(),
            descriptor: config.descriptor_for(scenario),
            checks,
        })
    }
}
