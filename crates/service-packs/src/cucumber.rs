//! cucumber JSON 보고서 → 감사 트리 수집
//!
//! 외부 BDD 러너가 `--format cucumber`로 출력한 보고서를 읽어
//! 프로브의 감사 서브트리에 시나리오와 스텝을 기록합니다.
//!
//! 스텝 상태 매핑:
//! - `passed` → 통과
//! - `failed`, `undefined`, `ambiguous` → 실패 (에러 메시지 보존)
//! - `skipped`, `pending` → 기록하지 않음

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use probr_core::audit::ProbeAudit;
use probr_core::exclusion::ExclusionPolicy;

use crate::error::ServicePackError;

/// 피처 하나
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Feature {
    pub uri: String,
    pub name: String,
    pub tags: Vec<Tag>,
    pub elements: Vec<Element>,
}

/// 시나리오 또는 배경(background)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Element {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub line: u32,
    pub tags: Vec<Tag>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Step {
    pub keyword: String,
    pub name: String,
    pub line: u32,
    pub result: StepOutcome,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StepOutcome {
    pub status: String,
    pub duration: Option<u64>,
    pub error_message: Option<String>,
}

/// 수집 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// 기록된 시나리오 수
    pub scenarios: usize,
    /// 제외 정책으로 건너뛴 시나리오 수
    pub excluded_scenarios: usize,
    /// 기록된 스텝 수
    pub steps: usize,
    /// 실패로 기록된 스텝 수
    pub failed_steps: usize,
}

/// 보고서를 파싱합니다. 빈 출력은 피처가 없는 보고서로 취급합니다.
pub fn parse_report(probe: &str, output: &[u8]) -> Result<Vec<Feature>, ServicePackError> {
    if output.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(output).map_err(|e| ServicePackError::Report {
        probe: probe.to_owned(),
        reason: e.to_string(),
    })
}

/// 파싱된 보고서를 감사 서브트리에 기록합니다.
pub fn ingest(audit: &mut ProbeAudit, features: &[Feature], policy: &ExclusionPolicy) -> IngestStats {
    let mut stats = IngestStats::default();
    let probe = audit.name.clone();

    for feature in features {
        let feature_tags: Vec<String> = feature.tags.iter().map(|t| t.name.clone()).collect();
        for tag in &feature_tags {
            if !audit.tags.contains(tag) {
                audit.tags.push(tag.clone());
            }
        }

        for element in feature.elements.iter().filter(|e| e.kind != "background") {
            let mut tags = feature_tags.clone();
            tags.extend(element.tags.iter().map(|t| t.name.clone()));

            if policy.is_scenario_excluded(&probe, &element.name, &tags) {
                debug!(probe = %probe, scenario = %element.name, "scenario excluded");
                stats.excluded_scenarios += 1;
                continue;
            }

            let id = audit.begin_scenario(&element.name, tags);
            stats.scenarios += 1;

            for step in &element.steps {
                let error = match step.result.status.as_str() {
                    "passed" => None,
                    "failed" => Some(
                        step.result
                            .error_message
                            .clone()
                            .unwrap_or_else(|| "step failed".to_owned()),
                    ),
                    "undefined" => Some("step is undefined".to_owned()),
                    "ambiguous" => Some(
                        step.result
                            .error_message
                            .clone()
                            .unwrap_or_else(|| "step is ambiguous".to_owned()),
                    ),
                    other => {
                        debug!(probe = %probe, step = %step.name, status = other, "step not recorded");
                        continue;
                    }
                };

                let failed = error.is_some();
                let name = format!("{} {}", step.keyword.trim(), step.name.trim());
                let payload = json!({
                    "feature": feature.uri,
                    "line": step.line,
                    "status": step.result.status,
                    "duration_ns": step.result.duration,
                });
                audit.record_step(id, name.trim(), &step.name, payload, error);

                stats.steps += 1;
                if failed {
                    stats.failed_steps += 1;
                }
            }
        }
    }

    stats
}
