//! 도메인 타입 — 프로브 식별자, 서비스 팩, 실행 상태
//!
//! 레지스트리, 스케줄러, 요약 집계가 공유하는 데이터 구조를 정의합니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 프로브 콜백이 없거나 레지스트리에서 찾을 수 없을 때의 종료 코드
pub const EXIT_PROBE_MISSING: i32 = 2;

/// 프로브 디스크립터가 유효하지 않을 때의 종료 코드
pub const EXIT_DESCRIPTOR_MISSING: i32 = 3;

/// 프로브가 의미 있는 종료 코드를 만들기 전에 실패했을 때의 종료 코드
pub const EXIT_INTERNAL_ERROR: i32 = 2;

/// 서비스 팩 — 하나의 기술 영역을 대상으로 하는 프로브 묶음
///
/// 알 수 없는 이름은 `Other`로 보존되며, 해당 팩의 프로브는 실행되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServicePack {
    /// 쿠버네티스 클러스터
    Kubernetes,
    /// 클라우드 스토리지 계정
    Storage,
    /// OPA 정책 엔진
    Opa,
    /// 인식되지 않은 서비스 팩
    Other(String),
}

impl ServicePack {
    /// 알려진 서비스 팩인지 확인합니다.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// 설정 및 태그에서 사용하는 이름을 반환합니다.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Kubernetes => "kubernetes",
            Self::Storage => "storage",
            Self::Opa => "opa",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ServicePack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServicePack {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "kubernetes" => Self::Kubernetes,
            "storage" => Self::Storage,
            "opa" => Self::Opa,
            _ => Self::Other(s.trim().to_owned()),
        })
    }
}

/// 프로브 식별자
///
/// 이름은 서비스 팩 안에서 고유하며, 생성 후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeDescriptor {
    /// 소속 서비스 팩
    pub service_pack: ServicePack,
    /// 프로브 이름 (예: `"pod_security_policy"`)
    pub name: String,
}

impl ProbeDescriptor {
    /// 새 디스크립터를 생성합니다.
    pub fn new(service_pack: ServicePack, name: impl Into<String>) -> Self {
        Self {
            service_pack,
            name: name.into(),
        }
    }

    /// 디스크립터가 실행 가능한 형태인지 확인합니다 (공백이 아닌 이름).
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

impl fmt::Display for ProbeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service_pack, self.name)
    }
}

/// 프로브 실행 상태
///
/// 상태 전환:
/// - `Pending` → `Running` → `CompleteSuccess` | `CompleteFail` | `Error`
/// - `Pending` → `Excluded` (등록 시점에만, 종료 상태)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// 실행 대기
    Pending,
    /// 실행 중
    Running,
    /// 종료 코드 0으로 완료
    CompleteSuccess,
    /// 0이 아닌 종료 코드로 완료
    CompleteFail,
    /// 프로브를 호출하기 전 또는 호출 중 내부 오류
    Error,
    /// 설정에 의해 제외됨
    Excluded,
}

impl ProbeStatus {
    /// 더 이상 전환되지 않는 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CompleteSuccess | Self::CompleteFail | Self::Error | Self::Excluded
        )
    }

    /// `self`에서 `next`로의 전환이 허용되는지 확인합니다.
    ///
    /// 완료된 프로브는 같은 프로세스에서 다시 실행될 수 있으므로
    /// `Complete*`/`Error` → `Running`은 허용합니다. `Excluded`는 빠져나올 수 없습니다.
    pub fn can_transition_to(&self, next: ProbeStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Running | Self::Excluded | Self::Error) => true,
            (Self::Running, Self::CompleteSuccess | Self::CompleteFail | Self::Error) => true,
            (Self::CompleteSuccess | Self::CompleteFail | Self::Error, Self::Running) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::CompleteSuccess => write!(f, "CompleteSuccess"),
            Self::CompleteFail => write!(f, "CompleteFail"),
            Self::Error => write!(f, "Error"),
            Self::Excluded => write!(f, "Excluded"),
        }
    }
}
