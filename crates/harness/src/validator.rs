//! 출력 검증기: 이름으로 출력 값을 찾고 술어로 검사
//!
//! 존재하지 않는 출력은 [`ValidationError::MissingOutput`], 존재하지만 술어를
//! 만족하지 않는 출력은 [`ValidationError::CheckFailure`]로 구분합니다.
//! 빈 문자열은 "존재하는" 값입니다.
//!
//! # 사용 예시
//!
//! ```
//! use provcheck_core::types::OutputSet;
//! use provcheck_harness::validator::{Predicate, validate};
//!
//! let outputs: OutputSet = [("vpc_id", "vpc-0abc")].into_iter().collect();
//! assert!(validate(&outputs, "vpc_id", &Predicate::NonEmpty).is_ok());
//! assert!(validate(&outputs, "db_endpoint", &Predicate::NonEmpty).is_err());
//! ```

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use provcheck_core::config::{
    CheckConfig, PREDICATE_EQUALS, PREDICATE_MATCHES, PREDICATE_NON_EMPTY,
};
use provcheck_core::error::ConfigError;
use provcheck_core::types::OutputSet;

use crate::error::ValidationError;

/// 사용자 정의 술어 함수. 실패 시 사유를 반환합니다.
pub type CheckFn = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// 출력 값 술어
#[derive(Clone)]
pub enum Predicate {
    /// 길이가 0보다 큼 (공백 제거 없음)
    NonEmpty,
    /// 정규식과 일치
    Matches(Regex),
    /// 정확히 같은 값
    Equals(String),
    /// 오케스트레이터가 정의한 술어
    Custom {
        /// 보고용 이름
        name: String,
        /// 검사 함수
        check: CheckFn,
    },
}

impl Predicate {
    /// 정규식 술어를 생성합니다.
    pub fn matches(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Matches)
    }

    pub fn equals(value: impl Into<String>) -> Self {
        Self::Equals(value.into())
    }

    /// 사용자 정의 술어를 생성합니다.
    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// 설정 항목으로부터 술어를 생성합니다.
    pub fn from_config(check: &CheckConfig) -> Result<Self, ConfigError> {
        match check.predicate.as_str() {
            PREDICATE_NON_EMPTY => Ok(Self::NonEmpty),
            PREDICATE_MATCHES => {
                let pattern = check.pattern.as_deref().ok_or_else(|| {
                    ConfigError::invalid(
                        format!("checks.{}.pattern", check.output),
                        "required for 'matches'",
                    )
                })?;
                Self::matches(pattern).map_err(|e| {
                    ConfigError::invalid(format!("checks.{}.pattern", check.output), e.to_string())
                })
            }
            PREDICATE_EQUALS => {
                let value = check.value.clone().ok_or_else(|| {
                    ConfigError::invalid(
                        format!("checks.{}.value", check.output),
                        "required for 'equals'",
                    )
                })?;
                Ok(Self::Equals(value))
            }
            other => Err(ConfigError::invalid(
                format!("checks.{}.predicate", check.output),
                format!("unknown predicate '{other}'"),
            )),
        }
    }

    /// 보고용 술어 이름
    pub fn name(&self) -> &str {
        match self {
            Self::NonEmpty => PREDICATE_NON_EMPTY,
            Self::Matches(_) => PREDICATE_MATCHES,
            Self::Equals(_) => PREDICATE_EQUALS,
            Self::Custom { name, .. } => name,
        }
    }

    /// 값을 검사합니다. 실패 시 사유를 반환합니다.
    pub fn evaluate(&self, value: &str) -> Result<(), String> {
        match self {
            Self::NonEmpty => {
                if value.is_empty() {
                    Err("value is empty".to_owned())
                } else {
                    Ok(())
                }
            }
            Self::Matches(re) => {
                if re.is_match(value) {
                    Ok(())
                } else {
                    Err(format!("value '{value}' does not match /{}/", re.as_str()))
                }
            }
            Self::Equals(expected) => {
                if value == expected {
                    Ok(())
                } else {
                    Err(format!("expected '{expected}', got '{value}'"))
                }
            }
            Self::Custom { check, .. } => check(value),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonEmpty => f.write_str("NonEmpty"),
            Self::Matches(re) => f.debug_tuple("Matches").field(&re.as_str()).finish(),
            Self::Equals(v) => f.debug_tuple("Equals").field(v).finish(),
            Self::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matches(re) => write!(f, "matches /{}/", re.as_str()),
            Self::Equals(v) => write!(f, "equals '{v}'"),
            other => f.write_str(other.name()),
        }
    }
}

/// 출력 집합에서 `name`을 찾아 술어로 검사합니다.
pub fn validate(
    outputs: &OutputSet,
    name: &str,
    predicate: &Predicate,
) -> Result<(), ValidationError> {
    let value = outputs
        .get(name)
        .ok_or_else(|| ValidationError::MissingOutput {
            name: name.to_owned(),
        })?;

    predicate
        .evaluate(value)
        .map_err(|reason| ValidationError::CheckFailure {
            name: name.to_owned(),
            reason,
        })
}
