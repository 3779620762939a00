//! 서비스 팩 통합 테스트
//!
//! 실제 godog 대신 cucumber 보고서를 출력하는 셸 스크립트를 러너로 사용해
//! 등록 → 실행 → 보고서 수집 → 감사 산출물 → 요약 전체 흐름을 검증합니다.

#![cfg(unix)]

use std::fs;
use std::path::Path;

use probr_core::config::ProbrConfig;
use probr_core::registry::ProbeRegistry;
use probr_core::summary::RunAudit;
use probr_core::types::ProbeStatus;
use probr_service_packs::{policy_from_config, register_all};

const PASSING_REPORT: &str = r#"[{"uri": "general.feature", "name": "General", "tags": [{"name": "@k-gen"}],
  "elements": [{"name": "Minimise wildcards", "type": "scenario", "tags": [{"name": "@k-gen-001"}],
    "steps": [{"keyword": "Given ", "name": "a cluster", "result": {"status": "passed"}}]}]}]"#;

const FAILING_REPORT: &str = r#"[{"uri": "iam.feature", "name": "IAM", "tags": [{"name": "@k-iam"}],
  "elements": [{"name": "Prevent cross namespace identities", "type": "scenario", "tags": [{"name": "@k-iam-001"}],
    "steps": [{"keyword": "Then ", "name": "creation is denied", "result": {"status": "failed", "error_message": "pod was created"}}]}]}]"#;

/// 마지막 인자(피처 파일)의 이름으로 보고서를 골라 출력하는 가짜 러너를 만듭니다.
/// 보고서에 실패 스텝이 있으면 종료 코드 1을 반환합니다.
fn write_fake_runner(dir: &Path) -> String {
    let reports = dir.join("reports");
    fs::create_dir_all(&reports).unwrap();
    fs::write(reports.join("general.json"), PASSING_REPORT).unwrap();
    fs::write(reports.join("iam.json"), FAILING_REPORT).unwrap();

    let script = dir.join("runner.sh");
    fs::write(
        &script,
        format!(
            r#"for last; do :; done
f="{}/$(basename "$last" .feature).json"
if [ -f "$f" ]; then
  cat "$f"
  grep -q '"failed"' "$f" && exit 1
fi
exit 0
"#,
            reports.display()
        ),
    )
    .unwrap();
    script.display().to_string()
}

fn config_for(dir: &Path) -> ProbrConfig {
    let script = write_fake_runner(dir);
    let mut config = ProbrConfig::parse(&format!(
        r#"
[audit]
dir = "{}"

[runner]
command = "sh"
args = ["{}"]
features_dir = "{}"

[[service_packs]]
name = "kubernetes"

[[service_packs.probes]]
name = "pod_security_policy"
excluded = true
justification = "PSP not enabled"
"#,
        dir.join("audit").display(),
        script,
        dir.join("features").display(),
    ))
    .unwrap();
    config.summary.enabled = false;
    config.validate().unwrap();
    config
}

#[test]
fn full_run_with_fake_runner() {
    // Given: general 통과, iam 실패, pod_security_policy 제외, 나머지는 빈 보고서
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    let registry = ProbeRegistry::new(policy_from_config(&config));
    assert_eq!(register_all(&registry, &config).unwrap(), 5);
    let mut run = RunAudit::new(config.audit.clone(), config.summary.enabled).unwrap();

    // When
    let exit_code = registry.execute_all(&mut run).unwrap();

    // Then
    assert_eq!(exit_code, 1);
    assert_eq!(registry.status("general").unwrap(), ProbeStatus::CompleteSuccess);
    assert_eq!(registry.status("iam").unwrap(), ProbeStatus::CompleteFail);
    assert_eq!(
        registry.status("pod_security_policy").unwrap(),
        ProbeStatus::Excluded
    );

    // general 통과, iam 실패, 나머지 3개는 제외 또는 시나리오 없음
    assert_eq!((run.passed(), run.failed(), run.skipped()), (1, 1, 3));
    assert_eq!(run.status(), "Complete - 1 of 2 Events Failed");

    let audit_dir = dir.path().join("audit");
    assert!(audit_dir.join("general.json").exists());
    assert!(audit_dir.join("iam.json").exists());
    assert!(!audit_dir.join("internet_access.json").exists());

    let iam: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(audit_dir.join("iam.json")).unwrap()).unwrap();
    assert_eq!(iam["result"], "Failed");
    assert_eq!(
        iam["scenarios"]["1"]["steps"]["1"]["error"],
        "pod was created"
    );

    let results = registry.all_results().unwrap();
    assert!(results["general"].contains("Minimise wildcards"));
}

#[test]
fn excluded_scenario_is_not_audited() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path());
    config.exclusions.tags = vec!["@k-gen-001".to_owned()];

    let registry = ProbeRegistry::new(policy_from_config(&config));
    register_all(&registry, &config).unwrap();
    let mut run = RunAudit::new(config.audit.clone(), false).unwrap();
    registry.execute("general", &mut run).unwrap();

    // 러너 출력에는 있지만 제외 태그가 붙은 시나리오는 기록하지 않음
    let summary = run.probe("general").unwrap();
    assert_eq!(summary.scenarios_attempted, 0);
    assert_eq!(summary.result, "No Probes Executed");
    assert!(!dir.path().join("audit").join("general.json").exists());
}

#[test]
fn missing_runner_is_reported_as_failed_with_error() {
    // Given: 존재하지 않는 러너 실행 파일
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path());
    config.runner.command = dir.path().join("no-such-godog").display().to_string();
    let registry = ProbeRegistry::new(policy_from_config(&config));
    register_all(&registry, &config).unwrap();
    let mut run = RunAudit::new(config.audit.clone(), false).unwrap();

    // When
    let exit_code = registry.execute("general", &mut run).unwrap();
    run.set_overall_status();

    // Then: 내부 오류 코드, 실패로 집계, 에러가 요약과 감사 산출물에 남음
    assert_eq!(exit_code, 2);
    assert_eq!(registry.status("general").unwrap(), ProbeStatus::Error);
    let summary = run.probe("general").unwrap();
    assert_eq!(summary.result, "Error");
    assert!(summary.error.as_deref().unwrap().contains("no-such-godog"));
    assert_eq!(run.status(), "Complete - 1 of 1 Events Failed");

    let artifact: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("audit").join("general.json")).unwrap(),
    )
    .unwrap();
    assert!(artifact["error"].as_str().unwrap().contains("no-such-godog"));
}
