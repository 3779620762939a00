//! 외부 BDD 러너 프로브 핸들러
//!
//! [`CommandProbeHandler`]는 설정된 러너(기본 `godog`)를 프로브의 피처 파일과
//! 제외 태그 표현식으로 실행합니다. 표준 출력은 결과 버퍼가 되고,
//! 프로세스 종료 코드가 프로브 종료 코드가 됩니다.
//! 출력은 cucumber JSON 보고서로 해석되어 감사 서브트리에 기록됩니다.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use bytes::Bytes;
use tracing::{debug, warn};

use probr_core::audit;
use probr_core::config::RunnerConfig;
use probr_core::error::ProbeError;
use probr_core::exclusion::ExclusionPolicy;
use probr_core::runner::{ProbeContext, ProbeExecution, ProbeHandler};

use crate::catalog::CatalogProbe;
use crate::cucumber;
use crate::error::ServicePackError;

/// 외부 러너 프로세스로 프로브를 실행하는 핸들러
#[derive(Debug, Clone)]
pub struct CommandProbeHandler {
    command: String,
    args: Vec<String>,
    feature_path: PathBuf,
    tag_expression: String,
    policy: ExclusionPolicy,
}

impl CommandProbeHandler {
    /// 카탈로그 프로브와 러너 설정으로 핸들러를 생성합니다.
    pub fn new(
        probe: &CatalogProbe,
        runner: &RunnerConfig,
        provider: Option<&str>,
        policy: &ExclusionPolicy,
    ) -> Self {
        Self {
            command: runner.command.clone(),
            args: runner.args.clone(),
            feature_path: probe.feature_path(&runner.features_dir, provider),
            tag_expression: policy.runner_tag_expression(&runner.tags, probe.name),
            policy: policy.clone(),
        }
    }

    /// 피처 파일 경로
    pub fn feature_path(&self) -> &PathBuf {
        &self.feature_path
    }

    /// 러너에 전달할 태그 표현식
    pub fn tag_expression(&self) -> &str {
        &self.tag_expression
    }

    /// 러너에 전달할 전체 인자 목록
    pub fn runner_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if !self.tag_expression.is_empty() {
            args.push(format!("--tags={}", self.tag_expression));
        }
        args.push(self.feature_path.display().to_string());
        args
    }

    fn launch(&self, probe: &str) -> Result<(i32, Bytes), ServicePackError> {
        let args = self.runner_args();
        debug!(probe, command = %self.command, args = ?args, "launching runner");

        let output = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ServicePackError::Launch {
                probe: probe.to_owned(),
                reason: format!("{}: {e}", self.command),
            })?;

        if !output.stderr.is_empty() {
            debug!(
                probe,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "runner stderr"
            );
        }

        let code = output.status.code().ok_or_else(|| ServicePackError::Launch {
            probe: probe.to_owned(),
            reason: format!("runner terminated without exit code ({})", output.status),
        })?;
        Ok((code, Bytes::from(output.stdout)))
    }
}

impl ProbeHandler for CommandProbeHandler {
    fn run(&self, ctx: &ProbeContext) -> Result<ProbeExecution, ProbeError> {
        let probe = ctx.descriptor.name.as_str();
        let (exit_code, output) = self.launch(probe)?;

        // 보고서 해석 실패는 진단 에러로만 남깁니다. 종료 코드가 통과/실패의 기준입니다.
        let error = match cucumber::parse_report(probe, &output) {
            Ok(features) => {
                let stats = cucumber::ingest(&mut audit::lock(&ctx.audit), &features, &self.policy);
                debug!(
                    probe,
                    scenarios = stats.scenarios,
                    excluded = stats.excluded_scenarios,
                    failed_steps = stats.failed_steps,
                    "runner report ingested"
                );
                None
            }
            Err(e) => {
                warn!(probe, error = %e, "runner report could not be ingested");
                Some(e.to_string())
            }
        };

        Ok(ProbeExecution {
            exit_code,
            output,
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use probr_core::types::ServicePack;

    use super::*;
    use crate::catalog;

    fn runner(command: &str, args: &[&str]) -> RunnerConfig {
        RunnerConfig {
            command: command.to_owned(),
            args: args.iter().map(|a| (*a).to_owned()).collect(),
            features_dir: PathBuf::from("features"),
            ..Default::default()
        }
    }

    fn general() -> &'static CatalogProbe {
        catalog::find(&ServicePack::Kubernetes, "general").unwrap()
    }

    #[test]
    fn runner_args_include_tags_and_feature_path() {
        let mut policy = ExclusionPolicy::new();
        policy.exclude_tag("@k-gen-003");
        let mut config = runner("godog", &["--format", "cucumber"]);
        config.tags = "@probes/kubernetes".to_owned();

        let handler = CommandProbeHandler::new(general(), &config, None, &policy);
        assert_eq!(
            handler.runner_args(),
            vec![
                "--format".to_owned(),
                "cucumber".to_owned(),
                "--tags=@probes/kubernetes && ~@k-gen-003".to_owned(),
                Path::new("features/service_packs/kubernetes/general/general.feature")
                    .display()
                    .to_string(),
            ]
        );
    }

    #[test]
    fn runner_args_omit_empty_tag_expression() {
        let handler = CommandProbeHandler::new(
            general(),
            &runner("godog", &[]),
            None,
            &ExclusionPolicy::new(),
        );
        assert_eq!(handler.tag_expression(), "");
        assert_eq!(handler.runner_args().len(), 1);
    }

    #[test]
    fn missing_runner_is_launch_error() {
        let handler = CommandProbeHandler::new(
            general(),
            &runner("probr-runner-that-does-not-exist", &[]),
            None,
            &ExclusionPolicy::new(),
        );
        let ctx = ProbeContext {
            descriptor: general().descriptor(),
            audit: audit::new_handle("general"),
        };
        let err = handler.run(&ctx).unwrap_err();
        assert!(matches!(err, ProbeError::Launch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn exit_code_and_stdout_are_captured() {
        // sh -c '<script>' <arg0> <args...>: 러너 인자는 무시됨
        let handler = CommandProbeHandler::new(
            general(),
            &runner("sh", &["-c", "echo '[]'; exit 3", "sh"]),
            None,
            &ExclusionPolicy::new(),
        );
        let ctx = ProbeContext {
            descriptor: general().descriptor(),
            audit: audit::new_handle("general"),
        };
        let execution = handler.run(&ctx).unwrap();
        assert_eq!(execution.exit_code, 3);
        assert_eq!(&execution.output[..], b"[]\n");
        assert!(execution.error.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_report_is_diagnostic_only() {
        let handler = CommandProbeHandler::new(
            general(),
            &runner("sh", &["-c", "echo 'godog: panic'; exit 0", "sh"]),
            None,
            &ExclusionPolicy::new(),
        );
        let ctx = ProbeContext {
            descriptor: general().descriptor(),
            audit: audit::new_handle("general"),
        };
        let execution = handler.run(&ctx).unwrap();
        assert_eq!(execution.exit_code, 0);
        assert!(execution.error.unwrap().contains("invalid cucumber report"));
    }
}
