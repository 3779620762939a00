//! 서비스 팩 에러 타입
//!
//! [`ServicePackError`]는 서비스 팩 등록과 러너 보고서 처리에서 발생하는 에러를 표현합니다.
//! `From<ServicePackError> for ProbrError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use probr_core::error::{ProbeError, ProbrError, RegistryError};

/// 서비스 팩 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ServicePackError {
    /// 레지스트리 등록 실패
    #[error("registration failed: {0}")]
    Registry(#[from] RegistryError),

    /// cucumber 보고서 해석 실패
    #[error("invalid cucumber report for probe '{probe}': {reason}")]
    Report {
        /// 대상 프로브
        probe: String,
        /// 실패 사유
        reason: String,
    },

    /// 러너 프로세스 실행 실패
    #[error("runner launch failed for probe '{probe}': {reason}")]
    Launch {
        /// 대상 프로브
        probe: String,
        /// 실패 사유
        reason: String,
    },
}

impl From<ServicePackError> for ProbrError {
    fn from(err: ServicePackError) -> Self {
        match err {
            ServicePackError::Registry(e) => ProbrError::Registry(e),
            ServicePackError::Report { probe, reason } => {
                ProbrError::Probe(ProbeError::Report { probe, reason })
            }
            ServicePackError::Launch { probe, reason } => {
                ProbrError::Probe(ProbeError::Launch { probe, reason })
            }
        }
    }
}

impl From<ServicePackError> for ProbeError {
    fn from(err: ServicePackError) -> Self {
        match err {
            ServicePackError::Report { probe, reason } => ProbeError::Report { probe, reason },
            ServicePackError::Launch { probe, reason } => ProbeError::Launch { probe, reason },
            ServicePackError::Registry(e) => ProbeError::Execution {
                probe: String::new(),
                reason: e.to_string(),
            },
        }
    }
}
