//! 프로브 실행기 — 등록된 프로브 하나를 동기적으로 실행
//!
//! [`ProbeHandler`]는 외부 BDD 러너처럼 실제 점검을 수행하는 협력자의 계약입니다.
//! [`run_probe`]는 핸들러를 호출하고 종료 코드로 상태를 결정한 뒤 결과 버퍼를 저장합니다.
//!
//! 실행은 블로킹이며 타임아웃이나 취소는 이 계층에서 제공하지 않습니다.
//! 멈춘 핸들러는 전체 실행 루프를 멈춥니다. 타임아웃이 필요하면 핸들러 안에서 처리해야 합니다.

use bytes::Bytes;
use tracing::{error, info, warn};

use crate::audit::ProbeAuditHandle;
use crate::error::ProbeError;
use crate::registry::RegisteredProbe;
use crate::types::{
    EXIT_DESCRIPTOR_MISSING, EXIT_INTERNAL_ERROR, EXIT_PROBE_MISSING, ProbeDescriptor, ProbeStatus,
};

/// 핸들러에 전달되는 실행 컨텍스트
#[derive(Debug, Clone)]
pub struct ProbeContext {
    /// 실행 중인 프로브
    pub descriptor: ProbeDescriptor,
    /// 이 프로브의 감사 서브트리
    pub audit: ProbeAuditHandle,
}

/// 핸들러 실행 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeExecution {
    /// 종료 코드 (0 = 통과)
    pub exit_code: i32,
    /// 러너 출력
    pub output: Bytes,
    /// 종료 코드와 별개로 보고된 진단 에러
    pub error: Option<String>,
}

impl ProbeExecution {
    /// 통과 결과를 생성합니다.
    pub fn passed(output: impl Into<Bytes>) -> Self {
        Self {
            exit_code: 0,
            output: output.into(),
            error: None,
        }
    }

    /// 주어진 종료 코드의 결과를 생성합니다.
    pub fn with_exit_code(exit_code: i32, output: impl Into<Bytes>) -> Self {
        Self {
            exit_code,
            output: output.into(),
            error: None,
        }
    }
}

/// 프로브 실행 콜백
///
/// `Err`는 러너가 의미 있는 종료 코드를 만들기 전에 실패한 경우입니다
/// (예: 실행 파일 없음). 시나리오 단언 실패는 0이 아닌 `exit_code`로 표현합니다.
///
/// 클로저도 핸들러로 사용할 수 있습니다.
/// ```ignore
/// registry.register(descriptor, Arc::new(|_ctx: &ProbeContext| {
///     Ok(ProbeExecution::passed("ok"))
/// }))?;
/// ```
pub trait ProbeHandler: Send + Sync {
    /// 프로브를 실행합니다.
    fn run(&self, ctx: &ProbeContext) -> Result<ProbeExecution, ProbeError>;
}

impl<F> ProbeHandler for F
where
    F: Fn(&ProbeContext) -> Result<ProbeExecution, ProbeError> + Send + Sync,
{
    fn run(&self, ctx: &ProbeContext) -> Result<ProbeExecution, ProbeError> {
        self(ctx)
    }
}

/// 실행 결과 요약
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// 집계에 반영할 종료 코드
    pub exit_code: i32,
    /// 진단용 에러 메시지
    pub error: Option<String>,
}

/// 등록된 프로브를 실행하고 상태와 결과를 갱신합니다.
///
/// - 프로브가 없으면 핸들러를 부르지 않고 [`EXIT_PROBE_MISSING`]
/// - 디스크립터가 유효하지 않으면 상태를 `Error`로 바꾸고 [`EXIT_DESCRIPTOR_MISSING`]
/// - 핸들러가 `Err`를 반환하면 상태 `Error`, [`EXIT_INTERNAL_ERROR`]
/// - 그 외에는 종료 코드가 0이면 `CompleteSuccess`, 아니면 `CompleteFail`
///   (보고된 진단 에러와 무관하게 종료 코드가 기준)
pub fn run_probe(probe: Option<&mut RegisteredProbe>, audit: ProbeAuditHandle) -> RunOutcome {
    let Some(probe) = probe else {
        error!("probe missing, nothing to run");
        return RunOutcome {
            exit_code: EXIT_PROBE_MISSING,
            error: Some("probe missing".to_owned()),
        };
    };

    if !probe.descriptor.is_valid() {
        error!(probe = %probe.descriptor, "probe descriptor missing");
        probe.status = ProbeStatus::Error;
        return RunOutcome {
            exit_code: EXIT_DESCRIPTOR_MISSING,
            error: Some("probe descriptor missing".to_owned()),
        };
    }

    let ctx = ProbeContext {
        descriptor: probe.descriptor.clone(),
        audit,
    };

    info!(probe = %probe.descriptor, "running probe");
    match probe.handler.run(&ctx) {
        Ok(execution) => {
            probe.status = if execution.exit_code == 0 {
                ProbeStatus::CompleteSuccess
            } else {
                ProbeStatus::CompleteFail
            };
            probe.results = Some(execution.output);

            if let Some(ref e) = execution.error {
                warn!(
                    probe = %probe.descriptor,
                    exit_code = execution.exit_code,
                    error = %e,
                    "probe reported an error"
                );
            }
            info!(
                probe = %probe.descriptor,
                exit_code = execution.exit_code,
                status = %probe.status,
                "probe finished"
            );

            RunOutcome {
                exit_code: execution.exit_code,
                error: execution.error,
            }
        }
        Err(e) => {
            error!(probe = %probe.descriptor, error = %e, "probe execution failed");
            probe.status = ProbeStatus::Error;
            RunOutcome {
                exit_code: EXIT_INTERNAL_ERROR,
                error: Some(e.to_string()),
            }
        }
    }
}
