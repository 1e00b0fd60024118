//! 도구 호출기: 디스크립터와 서브커맨드로 외부 도구 인자를 구성하고 실행
//!
//! [`ToolInvoker`]는 Terraform CLI 호환 도구(terraform, tofu)의 인자 규칙을
//! 알고 있는 유일한 곳입니다. 실제 프로세스 실행은 [`ProcessRunner`]에 위임합니다.
//!
//! # 인자 구성
//!
//! | 서브커맨드 | 인자 |
//! |------------|------|
//! | init       | `init -input=false [-no-color]` |
//! | apply      | `apply -auto-approve -input=false [-no-color] [-var-file=F]... [-var K=V]...` |
//! | destroy    | `destroy -auto-approve -input=false [-no-color] [-var-file=F]... [-var K=V]...` |
//! | output     | `output -raw NAME` / `output -json [-no-color]` |
//!
//! 라이프사이클은 출력을 `output -json` 한 번으로 읽습니다. 출력 하나마다
//! `output -raw`를 호출하면 없는 출력과 도구 실패가 같은 종료 코드로 섞이지만,
//! 목록에서는 없는 출력을 `MissingOutput`으로 구분할 수 있습니다.
//! `output -raw`는 단일 값 조회([`LifecycleRunner::read_output`])에만 씁니다.
//!
//! [`LifecycleRunner::read_output`]: crate::lifecycle::LifecycleRunner::read_output
//!
//! 재시도는 하지 않습니다.

use std::collections::BTreeMap;
use std::fmt;

use metrics::counter;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use provcheck_core::metrics::{INVOCATIONS_TOTAL, LABEL_RESULT, LABEL_SUBCOMMAND};
use provcheck_core::types::{ConfigurationDescriptor, InvocationResult, OutputSet};

use crate::error::{HarnessError, InvokeError};
use crate::runner::{CommandSpec, ProcessRunner};

/// 외부 도구 서브커맨드
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subcommand {
    /// 유닛 준비 (멱등)
    Init,
    /// 리소스 생성/갱신
    Apply,
    /// 리소스 정리
    Destroy,
    /// 단일 출력 값을 원문 그대로 읽기
    OutputRaw(String),
    /// 전체 출력을 JSON으로 읽기
    OutputJson,
}

impl Subcommand {
    /// 로그/메트릭용 고정 이름
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
            Self::OutputRaw(_) | Self::OutputJson => "output",
        }
    }
}

impl fmt::Display for Subcommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputRaw(name) => write!(f, "output -raw {name}"),
            Self::OutputJson => write!(f, "output -json"),
            other => f.write_str(other.name()),
        }
    }
}

/// Terraform CLI 호환 도구 호출기
pub struct ToolInvoker<R: ProcessRunner> {
    runner: R,
    binary: String,
    no_color: bool,
}

impl<R: ProcessRunner> ToolInvoker<R> {
    /// 새 호출기를 생성합니다. 기본적으로 `-no-color`를 전달합니다.
    pub fn new(runner: R, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
            no_color: true,
        }
    }

    /// `-no-color` 전달 여부를 설정합니다.
    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// 프로세스 실행 명세를 구성합니다 (부작용 없음).
    pub fn command(
        &self,
        descriptor: &ConfigurationDescriptor,
        subcommand: &Subcommand,
    ) -> CommandSpec {
        let mut args = vec![subcommand.name().to_owned()];

        match subcommand {
            Subcommand::Init => {
                args.push("-input=false".to_owned());
                self.push_no_color(&mut args);
            }
            Subcommand::Apply | Subcommand::Destroy => {
                args.push("-auto-approve".to_owned());
                args.push("-input=false".to_owned());
                self.push_no_color(&mut args);
                for var_file in descriptor.var_files() {
                    args.push(format!("-var-file={}", var_file.display()));
                }
                for (key, value) in descriptor.variables() {
                    args.push("-var".to_owned());
                    args.push(format!("{key}={}", render_variable(value)));
                }
            }
            Subcommand::OutputRaw(name) => {
                args.push("-raw".to_owned());
                args.push(name.clone());
            }
            Subcommand::OutputJson => {
                args.push("-json".to_owned());
                self.push_no_color(&mut args);
            }
        }

        CommandSpec {
            program: self.binary.clone(),
            args,
            working_dir: descriptor.unit_path().to_path_buf(),
            env: descriptor.environment().clone(),
        }
    }

    /// 서브커맨드를 실행합니다.
    ///
    /// 0이 아닌 종료 코드는 [`InvokeError::Execution`]으로 변환됩니다.
    /// `stop`이 취소되면 러너가 도구를 중단시키고 종료를 기다립니다.
    pub async fn run(
        &self,
        descriptor: &ConfigurationDescriptor,
        subcommand: &Subcommand,
        stop: &CancellationToken,
    ) -> Result<InvocationResult, InvokeError> {
        let spec = self.command(descriptor, subcommand);
        debug!(
            program = %spec.program,
            subcommand = %subcommand,
            unit = %spec.working_dir.display(),
            "invoking provisioning tool"
        );

        let result = self.runner.run(&spec, stop).await;

        let outcome = match &result {
            Ok(r) if r.success() => "success",
            _ => "failure",
        };
        counter!(
            INVOCATIONS_TOTAL,
            LABEL_SUBCOMMAND => subcommand.name(),
            LABEL_RESULT => outcome
        )
        .increment(1);

        let result = result?;
        if !result.success() {
            warn!(
                subcommand = %subcommand,
                exit_code = result.exit_code,
                unit = %spec.working_dir.display(),
                "provisioning tool exited with failure"
            );
            debug!(stderr = %result.stderr, "provisioning tool stderr");
            return Err(InvokeError::Execution {
                subcommand: subcommand.name().to_owned(),
                exit_code: result.exit_code,
                stderr: result.stderr.trim().to_owned(),
            });
        }
        Ok(result)
    }

    fn push_no_color(&self, args: &mut Vec<String>) {
        if self.no_color {
            args.push("-no-color".to_owned());
        }
    }
}

/// `-var` 값 렌더링
///
/// 문자열은 그대로, 숫자/불리언은 리터럴, 리스트/맵은 JSON으로 표현합니다.
/// JSON 리스트/객체는 HCL 표현식으로도 유효합니다.
pub fn render_variable(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
struct OutputEntry {
    value: serde_json::Value,
}

/// `output -json` 결과를 [`OutputSet`]으로 변환합니다.
///
/// 문자열 값은 그대로, 그 외 값은 압축된 JSON 문자열로 저장합니다.
/// 출력이 하나도 없으면 빈 집합을 반환합니다.
pub fn parse_output_listing(stdout: &str) -> Result<OutputSet, HarnessError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(OutputSet::default());
    }

    let entries: BTreeMap<String, OutputEntry> =
        serde_json::from_str(trimmed).map_err(|e| HarnessError::OutputFormat {
            reason: e.to_string(),
        })?;

    Ok(entries
        .into_iter()
        .map(|(name, entry)| (name, render_variable(&entry.value)))
        .collect())
}
