//! 실행 요약 — 프로브별 결과를 실행 단위 집계로 롤업
//!
//! [`RunAudit`]는 프로세스 시작 시 명시적으로 생성되어 레지스트리 실행에 `&mut`로 전달되고,
//! 종료 시 [`RunAudit::finalize`]로 최종 보고서를 만듭니다. 전역 상태는 없습니다.
//!
//! # 분류 규칙 (순서대로 평가)
//! 1. 제외됨 → `Skipped`
//! 2. 상태가 `Error` (러너가 의미 있는 종료 코드를 내지 못함) → `Failed`
//! 3. 기록된 시나리오가 없음 → `Skipped`
//! 4. 실패한 스텝이 없음 → `Passed`
//! 5. 그 외 → `Failed`

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{self, ProbeAuditHandle};
use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::types::{ProbeDescriptor, ProbeStatus, ServicePack};

/// 실행 시작 전 상태 문자열
pub const STATUS_RUNNING: &str = "Running";

/// 모든 이벤트가 통과했을 때의 상태 문자열
pub const STATUS_ALL_PASSED: &str = "Complete - All Events Completed Successfully";

/// 프로브 하나의 최종 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// 통과
    Passed,
    /// 실패
    Failed,
    /// 제외되었거나 실행된 시나리오 없음
    Skipped,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "Passed"),
            Self::Failed => write!(f, "Failed"),
            Self::Skipped => write!(f, "Skipped"),
        }
    }
}

/// 제외/에러 여부와 시나리오/스텝 수로 분류를 결정합니다.
pub fn classify(
    excluded: bool,
    errored: bool,
    scenarios: usize,
    failed_steps: usize,
) -> Classification {
    if excluded {
        Classification::Skipped
    } else if errored {
        Classification::Failed
    } else if scenarios == 0 {
        Classification::Skipped
    } else if failed_steps == 0 {
        Classification::Passed
    } else {
        Classification::Failed
    }
}

/// 프로브별 요약 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSummary {
    /// 프로브 이름
    pub name: String,
    /// 서비스 팩
    pub service_pack: ServicePack,
    /// 레지스트리 상태
    pub status: ProbeStatus,
    /// 사람이 읽을 수 있는 결과 (`"Success"`, `"Failed"`, `"Error"`, `"Excluded"`, `"No Probes Executed"`)
    pub result: String,
    /// 분류 (완료 전이면 `None`)
    pub classification: Option<Classification>,
    /// 시도한 시나리오 수
    pub scenarios_attempted: usize,
    /// 통과한 시나리오 수
    pub scenarios_succeeded: usize,
    /// 실패한 시나리오 수
    pub scenarios_failed: usize,
    /// 실패한 스텝 수
    pub failed_steps: usize,
    /// 생성한 리소스 수
    pub resources_created: usize,
    /// 정리한 리소스 수
    pub resources_destroyed: usize,
    /// 기록된 감사 산출물 경로 (제외되었거나 기록할 내용이 없으면 없음)
    pub audit_path: Option<PathBuf>,
    /// 실행 중 보고된 에러
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeSummary {
    fn new(descriptor: &ProbeDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            service_pack: descriptor.service_pack.clone(),
            status: ProbeStatus::Pending,
            result: String::new(),
            classification: None,
            scenarios_attempted: 0,
            scenarios_succeeded: 0,
            scenarios_failed: 0,
            failed_steps: 0,
            resources_created: 0,
            resources_destroyed: 0,
            audit_path: None,
            error: None,
        }
    }
}

/// 실행 단위 요약 보고서
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryReport {
    /// 실행 ID
    pub run_id: String,
    /// 전체 상태 문자열
    pub status: String,
    /// 통과한 프로브 수
    pub passed: usize,
    /// 실패한 프로브 수
    pub failed: usize,
    /// 건너뛴 프로브 수
    pub skipped: usize,
    /// 프로브별 요약 (이름순)
    pub probes: Vec<ProbeSummary>,
}

struct ProbeEntry {
    summary: ProbeSummary,
    audit: ProbeAuditHandle,
}

/// 실행 단위 감사 집계기
pub struct RunAudit {
    run_id: Uuid,
    settings: AuditConfig,
    summary_enabled: bool,
    status: String,
    passed: usize,
    failed: usize,
    skipped: usize,
    probes: BTreeMap<String, ProbeEntry>,
}

impl RunAudit {
    /// 새 실행 집계기를 생성합니다.
    ///
    /// 감사가 활성화되어 있으면 감사 디렉토리를 만들고 사용 가능한지 즉시 확인합니다.
    /// 첫 프로브가 끝날 때까지 미루지 않습니다.
    pub fn new(settings: AuditConfig, summary_enabled: bool) -> Result<Self, AuditError> {
        if settings.enabled {
            audit::prepare_dir(&settings.dir)?;
        }
        let run_id = Uuid::new_v4();
        debug!(run_id = %run_id, audit_dir = %settings.dir.display(), "run audit initialized");

        Ok(Self {
            run_id,
            settings,
            summary_enabled,
            status: STATUS_RUNNING.to_owned(),
            passed: 0,
            failed: 0,
            skipped: 0,
            probes: BTreeMap::new(),
        })
    }

    /// 실행 ID를 반환합니다.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// 요약 출력이 활성화되어 있는지 확인합니다.
    pub fn summary_enabled(&self) -> bool {
        self.summary_enabled
    }

    /// 프로브의 감사 서브트리 핸들을 찾거나 만듭니다.
    pub fn probe_handle(&mut self, descriptor: &ProbeDescriptor) -> ProbeAuditHandle {
        let entry = self
            .probes
            .entry(descriptor.name.clone())
            .or_insert_with(|| ProbeEntry {
                summary: ProbeSummary::new(descriptor),
                audit: audit::new_handle(descriptor.name.clone()),
            });
        Arc::clone(&entry.audit)
    }

    /// 보고된 에러 없이 프로브를 완료 처리합니다.
    ///
    /// [`complete_with_error`](Self::complete_with_error)와 같습니다.
    pub fn complete(
        &mut self,
        descriptor: &ProbeDescriptor,
        status: ProbeStatus,
    ) -> Result<Classification, AuditError> {
        self.complete_with_error(descriptor, status, None)
    }

    /// 프로브를 완료 처리합니다.
    ///
    /// 분류를 결정하고, 제외되지 않은 프로브는 감사 산출물을 기록합니다.
    /// `error`는 프로브의 감사 노드와 요약 항목에 보존되며 시나리오가 없어도 산출물에 남습니다.
    /// 같은 프로브를 다시 완료하면 재분류되며 카운트는 중복되지 않습니다.
    /// 이 실행에서 이미 기록한 산출물은 덮어씁니다.
    pub fn complete_with_error(
        &mut self,
        descriptor: &ProbeDescriptor,
        status: ProbeStatus,
        error: Option<String>,
    ) -> Result<Classification, AuditError> {
        let handle = self.probe_handle(descriptor);
        let mut probe_audit = audit::lock(&handle);

        let excluded = status == ProbeStatus::Excluded;
        if excluded {
            probe_audit.mark_excluded();
        }
        if let Some(message) = error {
            probe_audit.record_error(message);
        }

        let errored = status == ProbeStatus::Error;
        let scenarios = probe_audit.scenarios_attempted();
        let failed_steps = probe_audit.failed_steps();
        let classification = classify(excluded, errored, scenarios, failed_steps);

        let Some(entry) = self.probes.get_mut(&descriptor.name) else {
            return Ok(classification);
        };

        let audit_path = if excluded {
            None
        } else {
            let mut settings = self.settings.clone();
            if entry.summary.audit_path.is_some() {
                settings.overwrite_historical = true;
            }
            probe_audit.write(&settings)?
        };

        let summary = &mut entry.summary;
        summary.status = status;
        summary.classification = Some(classification);
        summary.result = match classification {
            Classification::Skipped if excluded => "Excluded",
            Classification::Skipped => "No Probes Executed",
            Classification::Passed => "Success",
            Classification::Failed if errored => "Error",
            Classification::Failed => "Failed",
        }
        .to_owned();
        summary.scenarios_attempted = scenarios;
        summary.scenarios_succeeded = probe_audit.scenarios_succeeded();
        summary.scenarios_failed = probe_audit.scenarios_failed();
        summary.failed_steps = failed_steps;
        summary.resources_created = probe_audit.resources.created.len();
        summary.resources_destroyed = probe_audit.resources.destroyed.len();
        summary.audit_path = audit_path;
        summary.error = probe_audit.error.clone();
        drop(probe_audit);

        self.recount();
        info!(
            probe = %descriptor,
            classification = %classification,
            scenarios,
            failed_steps,
            "probe completed"
        );
        Ok(classification)
    }

    fn recount(&mut self) {
        let (mut passed, mut failed, mut skipped) = (0, 0, 0);
        for entry in self.probes.values() {
            match entry.summary.classification {
                Some(Classification::Passed) => passed += 1,
                Some(Classification::Failed) => failed += 1,
                Some(Classification::Skipped) => skipped += 1,
                None => {}
            }
        }
        self.passed = passed;
        self.failed = failed;
        self.skipped = skipped;
    }

    /// 모든 프로브 완료 후 전체 상태를 계산합니다.
    pub fn set_overall_status(&mut self) {
        self.status = if self.passed > 0 && self.failed == 0 {
            STATUS_ALL_PASSED.to_owned()
        } else {
            let total_run = self.probes.len().saturating_sub(self.skipped);
            format!("Complete - {} of {} Events Failed", self.failed, total_run)
        };
    }

    /// 전체 상태 문자열
    pub fn status(&self) -> &str {
        &self.status
    }

    /// 통과한 프로브 수
    pub fn passed(&self) -> usize {
        self.passed
    }

    /// 실패한 프로브 수
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// 건너뛴 프로브 수
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// 프로브 요약을 조회합니다.
    pub fn probe(&self, name: &str) -> Option<&ProbeSummary> {
        self.probes.get(name).map(|e| &e.summary)
    }

    /// 현재 상태의 보고서 스냅샷을 만듭니다.
    pub fn report(&self) -> SummaryReport {
        SummaryReport {
            run_id: self.run_id.to_string(),
            status: self.status.clone(),
            passed: self.passed,
            failed: self.failed,
            skipped: self.skipped,
            probes: self.probes.values().map(|e| e.summary.clone()).collect(),
        }
    }

    /// 요약 보고서를 JSON으로 씁니다.
    pub fn write_summary(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *w, &self.report())?;
        writeln!(w)
    }

    /// 요약이 활성화되어 있으면 표준 출력에 씁니다.
    pub fn print_summary(&self) -> io::Result<()> {
        if !self.summary_enabled {
            return Ok(());
        }
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.write_summary(&mut lock)
    }

    /// 전체 상태를 계산하고 최종 보고서를 반환합니다.
    pub fn finalize(mut self) -> SummaryReport {
        self.set_overall_status();
        info!(
            run_id = %self.run_id,
            status = %self.status,
            passed = self.passed,
            failed = self.failed,
            skipped = self.skipped,
            "run finalized"
        );
        self.report()
    }
}

impl fmt::Debug for RunAudit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunAudit")
            .field("run_id", &self.run_id)
            .field("status", &self.status)
            .field("passed", &self.passed)
            .field("failed", &self.failed)
            .field("skipped", &self.skipped)
            .field("probes", &self.probes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde_json::json;

    use super::*;

    fn settings(dir: &Path) -> AuditConfig {
        AuditConfig {
            enabled: true,
            dir: dir.to_path_buf(),
            overwrite_historical: false,
        }
    }

    fn k8s(name: &str) -> ProbeDescriptor {
        ProbeDescriptor::new(ServicePack::Kubernetes, name)
    }

    fn record(run: &mut RunAudit, name: &str, steps: &[Option<&str>]) {
        let handle = run.probe_handle(&k8s(name));
        let mut probe = audit::lock(&handle);
        let id = probe.scenario("scenario");
        for (i, err) in steps.iter().enumerate() {
            probe.record_step(
                id,
                &format!("step {i}"),
                "",
                json!(null),
                err.map(str::to_owned),
            );
        }
    }

    #[test]
    fn classification_precedence_is_exhaustive() {
        for excluded in [false, true] {
            for errored in [false, true] {
                for scenarios in 0..3 {
                    for failed in 0..3 {
                        let c = classify(excluded, errored, scenarios, failed);
                        let expected = if excluded {
                            Classification::Skipped
                        } else if errored {
                            Classification::Failed
                        } else if scenarios == 0 {
                            Classification::Skipped
                        } else if failed == 0 {
                            Classification::Passed
                        } else {
                            Classification::Failed
                        };
                        assert_eq!(c, expected);
                    }
                }
            }
        }
    }

    #[test]
    fn new_fails_when_audit_dir_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let err = RunAudit::new(settings(&file), true).unwrap_err();
        assert!(matches!(err, AuditError::DirectoryUnavailable { .. }));
    }

    #[test]
    fn new_skips_dir_check_when_audit_disabled() {
        let mut s = settings(Path::new("/nonexistent/probr/audit"));
        s.enabled = false;
        assert!(RunAudit::new(s, false).is_ok());
    }

    #[test]
    fn complete_classifies_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut run = RunAudit::new(settings(dir.path()), true).unwrap();

        record(&mut run, "general", &[None, None]);
        record(&mut run, "iam", &[None, Some("denied")]);
        run.probe_handle(&k8s("internet_access"));

        assert_eq!(
            run.complete(&k8s("general"), ProbeStatus::CompleteSuccess).unwrap(),
            Classification::Passed
        );
        assert_eq!(
            run.complete(&k8s("iam"), ProbeStatus::CompleteFail).unwrap(),
            Classification::Failed
        );
        assert_eq!(
            run.complete(&k8s("internet_access"), ProbeStatus::CompleteSuccess).unwrap(),
            Classification::Skipped
        );
        assert_eq!(
            run.complete(&k8s("pod_security_policy"), ProbeStatus::Excluded).unwrap(),
            Classification::Skipped
        );

        assert_eq!((run.passed(), run.failed(), run.skipped()), (1, 1, 2));
        assert_eq!(run.probe("internet_access").unwrap().result, "No Probes Executed");
        assert_eq!(run.probe("pod_security_policy").unwrap().result, "Excluded");
        assert!(run.probe("pod_security_policy").unwrap().audit_path.is_none());
        assert_eq!(
            run.probe("iam").unwrap().audit_path.as_deref(),
            Some(dir.path().join("iam.json").as_path())
        );
    }

    #[test]
    fn errored_probe_is_failed_and_keeps_its_error() {
        // Given: 정상 프로브 하나와 러너 실행에 실패한 프로브 하나
        let dir = tempfile::tempdir().unwrap();
        let mut run = RunAudit::new(settings(dir.path()), true).unwrap();
        record(&mut run, "general", &[None]);
        run.complete(&k8s("general"), ProbeStatus::CompleteSuccess).unwrap();

        // When
        let classification = run
            .complete_with_error(
                &k8s("iam"),
                ProbeStatus::Error,
                Some("failed to launch runner: godog: not found".to_owned()),
            )
            .unwrap();
        run.set_overall_status();

        // Then: 건너뜀이 아니라 실패로 집계되고 에러가 요약과 산출물에 남는다
        assert_eq!(classification, Classification::Failed);
        assert_eq!((run.passed(), run.failed(), run.skipped()), (1, 1, 0));
        assert_eq!(run.status(), "Complete - 1 of 2 Events Failed");

        let iam = run.probe("iam").unwrap();
        assert_eq!(iam.result, "Error");
        assert_eq!(
            iam.error.as_deref(),
            Some("failed to launch runner: godog: not found")
        );
        let artifact = std::fs::read_to_string(iam.audit_path.as_ref().unwrap()).unwrap();
        assert!(artifact.contains("godog: not found"));
    }

    #[test]
    fn diagnostic_error_does_not_change_classification() {
        let dir = tempfile::tempdir().unwrap();
        let mut run = RunAudit::new(settings(dir.path()), true).unwrap();
        record(&mut run, "general", &[None]);

        let classification = run
            .complete_with_error(
                &k8s("general"),
                ProbeStatus::CompleteSuccess,
                Some("report is not valid cucumber JSON".to_owned()),
            )
            .unwrap();

        assert_eq!(classification, Classification::Passed);
        assert_eq!(
            run.probe("general").unwrap().error.as_deref(),
            Some("report is not valid cucumber JSON")
        );
    }

    #[test]
    fn completing_twice_does_not_double_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut run = RunAudit::new(settings(dir.path()), true).unwrap();
        record(&mut run, "general", &[None]);

        run.complete(&k8s("general"), ProbeStatus::CompleteSuccess).unwrap();
        record(&mut run, "general", &[Some("second run failed")]);
        let second = run.complete(&k8s("general"), ProbeStatus::CompleteFail).unwrap();

        assert_eq!(second, Classification::Failed);
        assert_eq!((run.passed(), run.failed(), run.skipped()), (0, 1, 0));
    }

    #[test]
    fn complete_refuses_to_overwrite_previous_run_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("general.json"), b"{}").unwrap();

        let mut run = RunAudit::new(settings(dir.path()), true).unwrap();
        record(&mut run, "general", &[None]);
        let err = run
            .complete(&k8s("general"), ProbeStatus::CompleteSuccess)
            .unwrap_err();
        assert!(matches!(err, AuditError::AlreadyExists { .. }));
    }

    #[test]
    fn overall_status_all_passed() {
        let dir = tempfile::tempdir().unwrap();
        let mut run = RunAudit::new(settings(dir.path()), true).unwrap();
        record(&mut run, "general", &[None]);
        run.complete(&k8s("general"), ProbeStatus::CompleteSuccess).unwrap();
        run.complete(&k8s("iam"), ProbeStatus::Excluded).unwrap();

        run.set_overall_status();
        assert_eq!(run.status(), STATUS_ALL_PASSED);
    }

    #[test]
    fn overall_status_counts_failures_against_run_total() {
        let dir = tempfile::tempdir().unwrap();
        let mut run = RunAudit::new(settings(dir.path()), true).unwrap();
        record(&mut run, "general", &[None]);
        record(&mut run, "iam", &[Some("x")]);
        run.complete(&k8s("general"), ProbeStatus::CompleteSuccess).unwrap();
        run.complete(&k8s("iam"), ProbeStatus::CompleteFail).unwrap();
        run.complete(&k8s("pod_security_policy"), ProbeStatus::Excluded).unwrap();

        run.set_overall_status();
        assert_eq!(run.status(), "Complete - 1 of 2 Events Failed");
    }

    #[test]
    fn overall_status_with_nothing_run() {
        let mut s = settings(Path::new("unused"));
        s.enabled = false;
        let mut run = RunAudit::new(s, true).unwrap();
        assert_eq!(run.status(), STATUS_RUNNING);
        run.set_overall_status();
        assert_eq!(run.status(), "Complete - 0 of 0 Events Failed");
    }

    #[test]
    fn write_summary_emits_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut run = RunAudit::new(settings(dir.path()), true).unwrap();
        record(&mut run, "general", &[None]);
        run.complete(&k8s("general"), ProbeStatus::CompleteSuccess).unwrap();
        run.set_overall_status();

        let mut buf = Vec::new();
        run.write_summary(&mut buf).unwrap();
        let report: SummaryReport = serde_json::from_slice(&buf).unwrap();
        assert_eq!(report.passed, 1);
        assert_eq!(report.probes[0].name, "general");
        assert_eq!(report.run_id, run.run_id().to_string());
    }

    #[test]
    fn print_summary_is_noop_when_disabled() {
        let mut s = settings(Path::new("unused"));
        s.enabled = false;
        let run = RunAudit::new(s, false).unwrap();
        assert!(!run.summary_enabled());
        run.print_summary().unwrap();
    }

    #[test]
    fn finalize_sets_status_and_tracks_resources() {
        let dir = tempfile::tempdir().unwrap();
        let mut run = RunAudit::new(settings(dir.path()), true).unwrap();
        record(&mut run, "general", &[None]);
        {
            let handle = run.probe_handle(&k8s("general"));
            let mut probe = audit::lock(&handle);
            probe.resource_created("probr-general-1");
            probe.resource_destroyed("probr-general-1");
        }
        run.complete(&k8s("general"), ProbeStatus::CompleteSuccess).unwrap();

        let report = run.finalize();
        assert_eq!(report.status, STATUS_ALL_PASSED);
        assert_eq!(report.probes[0].resources_created, 1);
        assert_eq!(report.probes[0].resources_destroyed, 1);
    }
}
