#![doc = include_str!("../README.md")]

pub mod audit;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod registry;
pub mod runner;
pub mod summary;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{AuditError, ConfigError, ProbeError, ProbrError, RegistryError};

// 설정
pub use config::ProbrConfig;

// 감사 트리
pub use audit::{
    AuditResult, ProbeAudit, ProbeAuditHandle, ScenarioAudit, ScenarioId, StepAudit, StepResult,
};

// 레지스트리와 실행
pub use exclusion::ExclusionPolicy;
pub use registry::{ProbeListing, ProbeRegistry, RegisteredProbe};
pub use runner::{ProbeContext, ProbeExecution, ProbeHandler};

// 요약
pub use summary::{Classification, ProbeSummary, RunAudit, SummaryReport};

// 도메인 타입
pub use types::{ProbeDescriptor, ProbeStatus, ServicePack};
