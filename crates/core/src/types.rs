//! 도메인 타입: 하네스 전역에서 사용되는 공통 타입
//!
//! [`ConfigurationDescriptor`]는 하나의 프로비저닝 유닛 실행을 기술하는
//! 불변 값입니다. 작업 디렉토리 같은 전역 상태 없이, 각 시나리오가
//! 자신의 디스크립터를 명시적으로 들고 다닙니다.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// 프로비저닝 유닛 실행 디스크립터
///
/// 생성 후에는 변경할 수 없습니다. [`DescriptorBuilder`]로 만듭니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationDescriptor {
    /// 유닛 디렉토리 (도구가 이 디렉토리에서 실행됨)
    unit_path: PathBuf,
    /// 입력 변수 (`-var k=v`)
    variables: BTreeMap<String, serde_json::Value>,
    /// 프로세스 환경변수 오버레이
    environment: BTreeMap<String, String>,
    /// 변수 파일 (`-var-file=...`)
    var_files: Vec<PathBuf>,
}

impl ConfigurationDescriptor {
    /// 주어진 유닛 경로로 빌더를 시작합니다.
    pub fn builder(unit_path: impl Into<PathBuf>) -> DescriptorBuilder {
        DescriptorBuilder::new(unit_path)
    }

    pub fn unit_path(&self) -> &Path {
        &self.unit_path
    }

    pub fn variables(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.variables
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn var_files(&self) -> &[PathBuf] {
        &self.var_files
    }
}

impl fmt::Display for ConfigurationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (vars={}, env={})",
            self.unit_path.display(),
            self.variables.len(),
            self.environment.len()
        )
    }
}

/// [`ConfigurationDescriptor`] 빌더
///
/// 같은 키를 여러 번 지정하면 마지막 값이 사용됩니다.
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    unit_path: PathBuf,
    variables: BTreeMap<String, serde_json::Value>,
    environment: BTreeMap<String, String>,
    var_files: Vec<PathBuf>,
}

impl DescriptorBuilder {
    pub fn new(unit_path: impl Into<PathBuf>) -> Self {
        Self {
            unit_path: unit_path.into(),
            variables: BTreeMap::new(),
            environment: BTreeMap::new(),
            var_files: Vec::new(),
        }
    }

    /// 입력 변수를 추가합니다.
    pub fn variable(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// 여러 입력 변수를 한 번에 추가합니다.
    pub fn variables<I, K>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        self.variables
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// 환경변수 오버라이드를 추가합니다.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// 여러 환경변수 오버라이드를 한 번에 추가합니다.
    pub fn envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment
            .extend(envs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// 변수 파일을 추가합니다. 지정한 순서대로 전달됩니다.
    pub fn var_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.var_files.push(path.into());
        self
    }

    pub fn build(self) -> ConfigurationDescriptor {
        ConfigurationDescriptor {
            unit_path: self.unit_path,
            variables: self.variables,
            environment: self.environment,
            var_files: self.var_files,
        }
    }
}

/// 외부 도구 1회 실행 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    /// 종료 코드 (시그널로 종료된 경우 -1)
    pub exit_code: i32,
    /// 표준 출력
    pub stdout: String,
    /// 표준 에러
    pub stderr: String,
}

impl InvocationResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// apply 이후 읽어온 출력 값 집합 (이름 -> 문자열 값)
///
/// 생성 후 읽기 전용입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSet {
    values: BTreeMap<String, String>,
}

impl OutputSet {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// 출력 값을 조회합니다. 존재하지 않으면 `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// 출력 이름 목록 (정렬됨)
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OutputSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// 시나리오 라이프사이클 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// 유닛 준비 (`init`)
    Init,
    /// 리소스 생성/갱신 (`apply`)
    Apply,
    /// 출력 값 읽기 (`output`)
    Outputs,
    /// 출력 값 검증
    Validate,
    /// 리소스 정리 (`destroy`)
    Destroy,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Apply => "apply",
            Self::Outputs => "outputs",
            Self::Validate => "validate",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
