//! 설정 관리: provcheck.toml 파싱 및 런타임 설정
//!
//! [`ProvcheckConfig`]는 도구 실행 설정과 시나리오 목록을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`PROVCHECK_TOOL_BINARY=tofu` 형식)
//! 3. 설정 파일 (`provcheck.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), provcheck_core::error::ProvcheckError> {
//! use provcheck_core::config::ProvcheckConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ProvcheckConfig::load("provcheck.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ProvcheckConfig::parse("[tool]\nbinary = \"tofu\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ProvcheckError};
use crate::types::ConfigurationDescriptor;

/// 지원하는 검증 술어 이름
pub const PREDICATE_NON_EMPTY: &str = "non_empty";
pub const PREDICATE_MATCHES: &str = "matches";
pub const PREDICATE_EQUALS: &str = "equals";

/// provcheck 통합 설정
///
/// `provcheck.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvcheckConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 외부 프로비저닝 도구 설정
    #[serde(default)]
    pub tool: ToolConfig,
    /// 실행 설정
    #[serde(default)]
    pub run: RunConfig,
    /// 모든 시나리오에 병합되는 기본 변수/환경변수
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// 시나리오 목록
    #[serde(default)]
    pub scenarios: Vec<ScenarioConfig>,
}

impl ProvcheckConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ProvcheckError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드/검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ProvcheckError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProvcheckError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ProvcheckError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ProvcheckError> {
        toml::from_str(toml_str).map_err(|e| {
            ProvcheckError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PROVCHECK_{SECTION}_{FIELD}`
    /// 예: `PROVCHECK_TOOL_BINARY=tofu`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "PROVCHECK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "PROVCHECK_GENERAL_LOG_FORMAT");

        // Tool
        override_string(&mut self.tool.binary, "PROVCHECK_TOOL_BINARY");
        override_bool(&mut self.tool.no_color, "PROVCHECK_TOOL_NO_COLOR");
        override_u64(
            &mut self.tool.init_timeout_secs,
            "PROVCHECK_TOOL_INIT_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.tool.apply_timeout_secs,
            "PROVCHECK_TOOL_APPLY_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.tool.destroy_timeout_secs,
            "PROVCHECK_TOOL_DESTROY_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.tool.output_timeout_secs,
            "PROVCHECK_TOOL_OUTPUT_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.tool.interrupt_grace_secs,
            "PROVCHECK_TOOL_INTERRUPT_GRACE_SECS",
        );

        // Run
        override_usize(&mut self.run.max_parallel, "PROVCHECK_RUN_MAX_PARALLEL");
        override_u64(
            &mut self.run.scenario_timeout_secs,
            "PROVCHECK_RUN_SCENARIO_TIMEOUT_SECS",
        );
        override_string(&mut self.run.root_dir, "PROVCHECK_RUN_ROOT_DIR");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ProvcheckError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            )
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            )
            .into());
        }

        if self.tool.binary.trim().is_empty() {
            return Err(ConfigError::invalid("tool.binary", "must not be empty").into());
        }

        let timeouts = [
            ("tool.init_timeout_secs", self.tool.init_timeout_secs),
            ("tool.apply_timeout_secs", self.tool.apply_timeout_secs),
            ("tool.destroy_timeout_secs", self.tool.destroy_timeout_secs),
            ("tool.output_timeout_secs", self.tool.output_timeout_secs),
        ];
        for (field, secs) in timeouts {
            if secs == 0 {
                return Err(ConfigError::invalid(field, "must be greater than 0").into());
            }
        }

        if self.run.max_parallel == 0 {
            return Err(ConfigError::invalid("run.max_parallel", "must be at least 1").into());
        }

        // 시나리오 검증
        let mut seen = HashSet::new();
        for (idx, scenario) in self.scenarios.iter().enumerate() {
            let prefix = format!("scenarios[{idx}]");
            if scenario.name.trim().is_empty() {
                return Err(
                    ConfigError::invalid(format!("{prefix}.name"), "must not be empty").into(),
                );
            }
            if !seen.insert(scenario.name.as_str()) {
                return Err(ConfigError::invalid(
                    format!("{prefix}.name"),
                    format!("duplicate scenario name '{}'", scenario.name),
                )
                .into());
            }
            if scenario.unit_path.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("{prefix}.unit_path"),
                    "must not be empty",
                )
                .into());
            }
            if scenario.checks.is_empty() {
                return Err(ConfigError::invalid(
                    format!("{prefix}.checks"),
                    "scenario must declare at least one check",
                )
                .into());
            }
            for (check_idx, check) in scenario.checks.iter().enumerate() {
                check.validate(&format!("{prefix}.checks[{check_idx}]"))?;
            }
        }

        Ok(())
    }

    /// 상대 경로인 `run.root_dir`을 `base` 기준으로 고정합니다.
    ///
    /// CLI는 설정 파일이 위치한 디렉토리를 `base`로 넘깁니다.
    pub fn anchor_root_dir(&mut self, base: &Path) {
        let root = Path::new(&self.run.root_dir);
        if root.is_relative() {
            self.run.root_dir = base.join(root).display().to_string();
        }
    }

    /// 이름으로 시나리오를 찾습니다.
    pub fn scenario(&self, name: &str) -> Option<&ScenarioConfig> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    /// 선택된 시나리오만 설정 순서대로 반환합니다. `names`가 비어 있으면 전체.
    pub fn select_scenarios(&self, names: &[String]) -> Result<Vec<&ScenarioConfig>, ConfigError> {
        if names.is_empty() {
            return Ok(self.scenarios.iter().collect());
        }
        if let Some(unknown) = names.iter().find(|n| self.scenario(n).is_none()) {
            return Err(ConfigError::invalid(
                "scenario",
                format!("unknown scenario '{unknown}'"),
            ));
        }
        Ok(self
            .scenarios
            .iter()
            .filter(|s| names.contains(&s.name))
            .collect())
    }

    /// 기본값을 병합하여 시나리오의 디스크립터를 생성합니다.
    ///
    /// 시나리오에 지정된 값이 `[defaults]`보다 우선합니다.
    pub fn descriptor_for(&self, scenario: &ScenarioConfig) -> ConfigurationDescriptor {
        let root = PathBuf::from(&self.run.root_dir);
        let mut builder = ConfigurationDescriptor::builder(root.join(&scenario.unit_path))
            .variables(self.defaults.variables.clone())
            .variables(scenario.variables.clone())
            .envs(self.defaults.environment.clone())
            .envs(scenario.environment.clone());
        for var_file in &scenario.var_files {
            builder = builder.var_file(root.join(var_file));
        }
        builder.build()
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 외부 프로비저닝 도구 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// 실행 파일 (terraform, tofu 등)
    pub binary: String,
    /// `-no-color` 전달 여부
    pub no_color: bool,
    /// init 타임아웃 (초)
    pub init_timeout_secs: u64,
    /// apply 타임아웃 (초)
    pub apply_timeout_secs: u64,
    /// destroy 타임아웃 (초)
    pub destroy_timeout_secs: u64,
    /// output 타임아웃 (초)
    pub output_timeout_secs: u64,
    /// 취소/타임아웃 시 SIGINT 후 강제 종료까지 기다리는 시간 (초, 0이면 즉시 종료)
    pub interrupt_grace_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary: "terraform".to_owned(),
            no_color: true,
            init_timeout_secs: 600,
            apply_timeout_secs: 3600,
            destroy_timeout_secs: 3600,
            output_timeout_secs: 120,
            interrupt_grace_secs: 30,
        }
    }
}

impl ToolConfig {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }

    pub fn destroy_timeout(&self) -> Duration {
        Duration::from_secs(self.destroy_timeout_secs)
    }

    pub fn output_timeout(&self) -> Duration {
        Duration::from_secs(self.output_timeout_secs)
    }

    pub fn interrupt_grace(&self) -> Duration {
        Duration::from_secs(self.interrupt_grace_secs)
    }
}

/// 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// 동시에 실행할 최대 시나리오 수
    pub max_parallel: usize,
    /// 검증 단계 타임아웃 (초, 0이면 무제한)
    pub scenario_timeout_secs: u64,
    /// 유닛 경로의 기준 디렉토리
    pub root_dir: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            scenario_timeout_secs: 0,
            root_dir: ".".to_owned(),
        }
    }
}

impl RunConfig {
    /// 검증 단계 타임아웃. 0이면 `None`.
    pub fn scenario_timeout(&self) -> Option<Duration> {
        (self.scenario_timeout_secs > 0).then(|| Duration::from_secs(self.scenario_timeout_secs))
    }
}

/// 모든 시나리오에 공통으로 적용되는 값
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// 기본 입력 변수
    pub variables: BTreeMap<String, serde_json::Value>,
    /// 기본 환경변수
    pub environment: BTreeMap<String, String>,
}

/// 시나리오 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// 시나리오 이름 (고유)
    pub name: String,
    /// 유닛 경로 (`run.root_dir` 기준)
    pub unit_path: String,
    /// 입력 변수
    #[serde(default)]
    pub variables: BTreeMap<String, serde_json::Value>,
    /// 환경변수 오버라이드
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// 변수 파일 (`run.root_dir` 기준)
    #[serde(default)]
    pub var_files: Vec<String>,
    /// 출력 검증 목록 (선언 순서대로 평가)
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

/// 출력 검증 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// 검증할 출력 이름
    pub output: String,
    /// 술어 (non_empty, matches, equals)
    #[serde(default = "default_predicate")]
    pub predicate: String,
    /// `matches`용 정규식
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// `equals`용 기대값
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

fn default_predicate() -> String {
    PREDICATE_NON_EMPTY.to_owned()
}

impl CheckConfig {
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.output.trim().is_empty() {
            return Err(ConfigError::invalid(
                format!("{field}.output"),
                "must not be empty",
            ));
        }
        match self.predicate.as_str() {
            PREDICATE_NON_EMPTY => Ok(()),
            PREDICATE_MATCHES => {
                let pattern = self.pattern.as_deref().ok_or_else(|| {
                    ConfigError::invalid(
                        format!("{field}.pattern"),
                        "required for predicate 'matches'",
                    )
                })?;
                regex::Regex::new(pattern)
                    .map(|_| ())
                    .map_err(|e| ConfigError::invalid(format!("{field}.pattern"), e.to_string()))
            }
            PREDICATE_EQUALS => {
                if self.value.is_none() {
                    return Err(ConfigError::invalid(
                        format!("{field}.value"),
                        "required for predicate 'equals'",
                    ));
                }
                Ok(())
            }
            other => Err(ConfigError::invalid(
                format!("{field}.predicate"),
                format!(
                    "unknown predicate '{other}', expected one of: {PREDICATE_NON_EMPTY}, {PREDICATE_MATCHES}, {PREDICATE_EQUALS}"
                ),
            )),
        }
    }
}

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
