//! Probr 기본 서비스 팩
//!
//! 쿠버네티스, 스토리지, OPA 서비스 팩의 프로브를 레지스트리에 명시적으로 등록합니다.
//! 모듈 로딩 시점의 부수 효과 없이 [`register_all`] 호출 한 번으로 등록됩니다.
//!
//! # 모듈 구성
//!
//! - [`catalog`]: 프로브 카탈로그, 피처 파일 경로, 쿠버네티스 태그 맵
//! - [`command`]: 외부 BDD 러너 핸들러 (`CommandProbeHandler`)
//! - [`cucumber`]: cucumber JSON 보고서 → 감사 트리 수집
//! - [`error`]: 도메인 에러 (`ServicePackError`)

pub mod catalog;
pub mod command;
pub mod cucumber;
pub mod error;

use std::sync::Arc;

use tracing::{info, warn};

use probr_core::config::ProbrConfig;
use probr_core::exclusion::ExclusionPolicy;
use probr_core::registry::ProbeRegistry;
use probr_core::types::ServicePack;

pub use catalog::{CatalogPack, CatalogProbe};
pub use command::CommandProbeHandler;
pub use error::ServicePackError;

/// 설정에서 제외 정책을 구성합니다.
///
/// 전역 제외 태그는 쿠버네티스 태그 맵으로 확장됩니다
/// (예: `@probes/kubernetes/iam` → `k-iam`).
pub fn policy_from_config(config: &ProbrConfig) -> ExclusionPolicy {
    let mut policy = ExclusionPolicy::from_config(config);
    for tag in catalog::expand_tags(&config.exclusions.tags) {
        policy.exclude_tag(&tag);
    }
    policy
}

/// 카탈로그의 모든 프로브를 레지스트리에 등록하고 등록된 수를 반환합니다.
///
/// 제공자 설정이 필요한 팩(storage, opa)은 제공자가 없으면 경고 후 건너뜁니다.
/// 제외된 프로브도 등록되며 상태가 `Excluded`가 됩니다.
pub fn register_all(
    registry: &ProbeRegistry,
    config: &ProbrConfig,
) -> Result<usize, ServicePackError> {
    let mut count = 0;

    for pack in CatalogPack::ALL {
        let provider = config
            .service_pack(&pack.service_pack())
            .map(|p| p.provider.trim())
            .filter(|p| !p.is_empty());

        if pack.requires_provider() && provider.is_none() {
            warn!(
                pack = %pack.service_pack(),
                "ignoring service pack: provider is not configured"
            );
            continue;
        }

        for probe in pack.probes() {
            let handler =
                CommandProbeHandler::new(probe, &config.runner, provider, registry.policy());
            registry.register(probe.descriptor(), Arc::new(handler))?;
            count += 1;
        }
    }

    warn_unknown_probes(config);
    info!(count, "service pack probes registered");
    Ok(count)
}

/// 설정에 있지만 카탈로그에 없는 프로브 이름을 경고합니다.
fn warn_unknown_probes(config: &ProbrConfig) {
    for pack_config in &config.service_packs {
        let Ok(pack) = pack_config.name.parse::<ServicePack>();
        for probe in &pack_config.probes {
            if catalog::find(&pack, &probe.name).is_none() {
                warn!(pack = %pack, probe = %probe.name, "configured probe is not in the catalog");
            }
        }
    }
}
