//! 제외 정책 — 설정 기반 프로브/시나리오/태그 제외 판정
//!
//! [`ExclusionPolicy`]는 설정에서 한 번 구성되고, 이후에는 순수 함수처럼 동작합니다.
//! 두 가지 형태의 판정을 제공합니다.
//!
//! - 프로브 단위: 서비스 팩 전체 제외 또는 팩별 프로브 이름 제외
//! - 시나리오 단위: 전역 태그 거부 목록 또는 프로브별 시나리오 제외
//!
//! 두 형태 모두 "이름 또는 태그가 거부 목록과 교집합을 가지면 제외"로 귀결됩니다.
//! 인식되지 않은 서비스 팩은 실행하지 않습니다 (fail safe).

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::warn;

use crate::config::ProbrConfig;
use crate::types::{ProbeDescriptor, ServicePack};

/// 설정에서 구성된 제외 정책
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    /// 전체가 제외된 서비스 팩
    excluded_packs: HashSet<ServicePack>,
    /// 서비스 팩별 제외 프로브 이름
    excluded_probes: HashMap<ServicePack, HashSet<String>>,
    /// 프로브별 제외 시나리오 이름/태그 (`@` 제거된 형태)
    excluded_scenarios: HashMap<String, BTreeSet<String>>,
    /// 전역 태그 거부 목록 (`@` 제거된 형태)
    excluded_tags: BTreeSet<String>,
}

impl ExclusionPolicy {
    /// 아무것도 제외하지 않는 정책을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정에서 정책을 구성합니다.
    ///
    /// 사유(justification)가 없는 제외 항목은 경고를 남기지만 그대로 적용합니다.
    /// 이름이 빈 항목은 제외할 대상이 없으므로 무시합니다.
    pub fn from_config(config: &ProbrConfig) -> Self {
        let mut policy = Self::new();

        for tag in &config.exclusions.tags {
            policy.exclude_tag(tag);
        }

        for pack_config in &config.service_packs {
            let Ok(pack) = pack_config.name.parse::<ServicePack>();

            if pack_config.excluded {
                warn_if_unjustified(&pack_config.name, &pack_config.justification);
                policy.exclude_pack(pack.clone());
            }

            for probe in &pack_config.probes {
                if probe.name.trim().is_empty() {
                    warn!(pack = %pack, "ignoring probe exclusion entry without a name");
                    continue;
                }
                if probe.excluded {
                    warn_if_unjustified(&probe.name, &probe.justification);
                    policy.exclude_probe(pack.clone(), &probe.name);
                    continue;
                }
                for scenario in probe.scenarios.iter().filter(|s| s.excluded) {
                    if scenario.name.trim().is_empty() {
                        warn!(probe = %probe.name, "ignoring scenario exclusion entry without a name");
                        continue;
                    }
                    warn_if_unjustified(&scenario.name, &scenario.justification);
                    policy.exclude_scenario(&probe.name, &scenario.name);
                }
            }
        }

        policy
    }

    /// 서비스 팩 전체를 제외합니다.
    pub fn exclude_pack(&mut self, pack: ServicePack) {
        self.excluded_packs.insert(pack);
    }

    /// 서비스 팩의 특정 프로브를 제외합니다.
    pub fn exclude_probe(&mut self, pack: ServicePack, name: &str) {
        self.excluded_probes
            .entry(pack)
            .or_default()
            .insert(name.trim().to_owned());
    }

    /// 프로브의 특정 시나리오(이름 또는 태그)를 제외합니다.
    pub fn exclude_scenario(&mut self, probe: &str, scenario: &str) {
        self.excluded_scenarios
            .entry(probe.trim().to_owned())
            .or_default()
            .insert(normalize_tag(scenario));
    }

    /// 전역 거부 목록에 태그를 추가합니다.
    pub fn exclude_tag(&mut self, tag: &str) {
        let tag = normalize_tag(tag);
        if !tag.is_empty() {
            self.excluded_tags.insert(tag);
        }
    }

    /// 프로브가 제외되는지 판정합니다.
    ///
    /// 다음 중 하나라도 해당하면 제외됩니다.
    /// - 인식되지 않은 서비스 팩 (경고 로그)
    /// - 서비스 팩 전체 제외
    /// - 팩별 제외 프로브 목록에 이름이 있음
    /// - 전역 태그 거부 목록에 프로브 이름 또는 팩 이름이 있음
    pub fn is_excluded(&self, descriptor: &ProbeDescriptor) -> bool {
        if !descriptor.service_pack.is_known() {
            warn!(
                probe = %descriptor.name,
                pack = %descriptor.service_pack,
                "unrecognized service pack, excluding probe"
            );
            return true;
        }

        if self.excluded_packs.contains(&descriptor.service_pack) {
            return true;
        }

        if self
            .excluded_probes
            .get(&descriptor.service_pack)
            .is_some_and(|names| names.contains(descriptor.name.as_str()))
        {
            return true;
        }

        self.excluded_tags.contains(descriptor.name.as_str())
            || self.excluded_tags.contains(descriptor.service_pack.as_str())
    }

    /// 태그 중 하나라도 전역 거부 목록에 있으면 `true`를 반환합니다.
    pub fn is_tag_excluded<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter()
            .any(|t| self.excluded_tags.contains(&normalize_tag(t.as_ref())))
    }

    /// 시나리오가 제외되는지 판정합니다 (전역 태그 또는 프로브별 시나리오 제외).
    pub fn is_scenario_excluded<S: AsRef<str>>(
        &self,
        probe: &str,
        scenario: &str,
        tags: &[S],
    ) -> bool {
        if self.is_tag_excluded(tags) {
            return true;
        }
        let Some(excluded) = self.excluded_scenarios.get(probe) else {
            return false;
        };
        excluded.contains(&normalize_tag(scenario))
            || tags
                .iter()
                .any(|t| excluded.contains(&normalize_tag(t.as_ref())))
    }

    /// 외부 BDD 러너에 전달할 태그 표현식을 만듭니다.
    ///
    /// 기본 표현식에 제외 태그를 `~@tag` 형태로 AND 결합합니다.
    /// 결과는 결정적 순서를 가집니다.
    pub fn runner_tag_expression(&self, base: &str, probe: &str) -> String {
        let mut parts = Vec::new();
        let base = base.trim();
        if !base.is_empty() {
            parts.push(base.to_owned());
        }

        let mut negated: BTreeSet<&str> = self.excluded_tags.iter().map(String::as_str).collect();
        if let Some(scenarios) = self.excluded_scenarios.get(probe) {
            negated.extend(scenarios.iter().map(String::as_str));
        }
        parts.extend(
            negated
                .into_iter()
                .filter(|t| !t.contains(char::is_whitespace))
                .map(|t| format!("~@{t}")),
        );

        parts.join(" && ")
    }
}

/// `@` 접두어와 공백을 제거한 태그 형태
fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('@').to_owned()
}

fn warn_if_unjustified(name: &str, justification: &str) {
    if justification.trim().is_empty() {
        warn!(
            exclusion = name,
            "exclusion has no justification; excluding anyway"
        );
    }
}
