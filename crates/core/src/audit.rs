//! 감사 트리 — 프로브 → 시나리오 → 스텝 결과 누적과 영속화
//!
//! 각 프로브는 자신의 [`ProbeAudit`] 서브트리를 독점합니다.
//! 실행 중인 프로브에는 [`ProbeAuditHandle`](`Arc<Mutex<ProbeAudit>>`)이 전달되므로
//! 프로브마다 독립적으로 잠글 수 있습니다.
//!
//! # 결과 전파
//! 스텝이 기록될 때마다 상위 시나리오와 프로브의 결과가 아래에서 위로 다시 계산됩니다.
//! 부모는 자식 중 하나라도 `Failed`이면 `Failed`, 아니면 `Success`입니다.
//!
//! # 이름 충돌
//! 같은 부모 아래 같은 이름이 다시 기록되면 `"Login 2"`, `"Login 3"`처럼
//! 접미사를 붙여 이전 기록을 보존합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AuditConfig;
use crate::error::AuditError;

/// 실행 중인 프로브에 전달되는 감사 서브트리 핸들
pub type ProbeAuditHandle = Arc<Mutex<ProbeAudit>>;

/// 새 감사 서브트리 핸들을 생성합니다.
pub fn new_handle(name: impl Into<String>) -> ProbeAuditHandle {
    Arc::new(Mutex::new(ProbeAudit::new(name)))
}

/// 핸들을 잠급니다. 다른 스레드의 패닉으로 잠금이 오염되어도 감사 기록은 계속 읽을 수 있습니다.
pub fn lock(handle: &ProbeAuditHandle) -> MutexGuard<'_, ProbeAudit> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Results ─────────────────────────────────────────────────────────

/// 프로브/시나리오 수준의 집계 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuditResult {
    /// 아직 기록된 자식이 없음
    #[default]
    NotRun,
    /// 모든 자식이 통과
    Success,
    /// 하나 이상의 자식이 실패
    Failed,
    /// 설정에 의해 제외됨
    Excluded,
}

impl fmt::Display for AuditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRun => write!(f, "NotRun"),
            Self::Success => write!(f, "Success"),
            Self::Failed => write!(f, "Failed"),
            Self::Excluded => write!(f, "Excluded"),
        }
    }
}

/// 스텝 수준의 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepResult {
    /// 에러 없이 완료
    Passed,
    /// 에러와 함께 완료
    Failed,
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "Passed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

// ─── StepAudit ───────────────────────────────────────────────────────

/// 하나의 스텝 기록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepAudit {
    /// 스텝 이름 (호출자가 명시적으로 전달, 충돌 시 접미사 포함)
    pub name: String,
    /// 사람이 읽을 수 있는 설명
    pub description: String,
    /// 결과
    pub result: StepResult,
    /// 진단용 구조화 데이터
    pub payload: serde_json::Value,
    /// 실패 시 에러 메시지
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ─── ScenarioAudit ───────────────────────────────────────────────────

/// 하나의 시나리오 기록
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAudit {
    /// 시나리오 이름
    pub name: String,
    /// 집계 결과
    pub result: AuditResult,
    /// 1부터 시작하는 순번 → 스텝
    pub steps: BTreeMap<usize, StepAudit>,
    /// 시나리오 태그
    pub tags: Vec<String>,
}

impl ScenarioAudit {
    fn new(name: String, tags: Vec<String>) -> Self {
        Self {
            name,
            tags,
            ..Default::default()
        }
    }

    fn record_step(
        &mut self,
        name: &str,
        description: &str,
        payload: serde_json::Value,
        error: Option<String>,
    ) -> StepResult {
        let result = if error.is_some() {
            StepResult::Failed
        } else {
            StepResult::Passed
        };
        let name = unique_name(self.steps.values().map(|s| s.name.as_str()), name);
        let index = self.steps.len() + 1;
        self.steps.insert(
            index,
            StepAudit {
                name,
                description: description.to_owned(),
                result,
                payload,
                error,
            },
        );
        self.recompute();
        result
    }

    fn recompute(&mut self) {
        self.result = if self.steps.is_empty() {
            AuditResult::NotRun
        } else if self.failed_steps() > 0 {
            AuditResult::Failed
        } else {
            AuditResult::Success
        };
    }

    /// 실패한 스텝 수를 반환합니다.
    pub fn failed_steps(&self) -> usize {
        self.steps
            .values()
            .filter(|s| s.result == StepResult::Failed)
            .count()
    }
}

/// 감사 트리 안에서 시나리오를 가리키는 식별자
///
/// [`ProbeAudit::scenario`] 또는 [`ProbeAudit::begin_scenario`]가 반환합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScenarioId(usize);

// ─── ResourceAudit ───────────────────────────────────────────────────

/// 프로브가 대상 환경에 만든 리소스 기록 (예: 쿠버네티스 파드)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAudit {
    /// 생성된 리소스 이름
    pub created: Vec<String>,
    /// 정리된 리소스 이름
    pub destroyed: Vec<String>,
}

// ─── ProbeAudit ──────────────────────────────────────────────────────

/// 하나의 프로브 감사 서브트리
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeAudit {
    /// 프로브 이름 (산출물 파일명으로도 사용)
    pub name: String,
    /// 집계 결과
    pub result: AuditResult,
    /// 1부터 시작하는 순번 → 시나리오
    pub scenarios: BTreeMap<usize, ScenarioAudit>,
    /// 프로브 태그
    pub tags: Vec<String>,
    /// 리소스 기록
    #[serde(default)]
    pub resources: ResourceAudit,
    /// 실행 중 보고된 에러 (러너 실행 실패, 보고서 해석 실패 등)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeAudit {
    /// 빈 감사 서브트리를 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 이름으로 시나리오를 찾거나 새로 만듭니다.
    ///
    /// 같은 이름으로 반복 호출하면 같은 시나리오를 반환합니다.
    pub fn scenario(&mut self, name: &str) -> ScenarioId {
        if let Some((index, _)) = self.scenarios.iter().find(|(_, s)| s.name == name) {
            return ScenarioId(*index);
        }
        self.insert_scenario(name.to_owned(), Vec::new())
    }

    /// 항상 새 시나리오를 시작합니다. 이름이 이미 있으면 접미사를 붙입니다.
    pub fn begin_scenario(&mut self, name: &str, tags: Vec<String>) -> ScenarioId {
        let name = unique_name(self.scenarios.values().map(|s| s.name.as_str()), name);
        self.insert_scenario(name, tags)
    }

    fn insert_scenario(&mut self, name: String, tags: Vec<String>) -> ScenarioId {
        let index = self.scenarios.len() + 1;
        debug!(probe = %self.name, scenario = %name, index, "scenario audit created");
        self.scenarios.insert(index, ScenarioAudit::new(name, tags));
        ScenarioId(index)
    }

    /// 시나리오를 조회합니다.
    pub fn get_scenario(&self, id: ScenarioId) -> Option<&ScenarioAudit> {
        self.scenarios.get(&id.0)
    }

    /// 이름으로 시나리오를 조회합니다.
    pub fn find_scenario(&self, name: &str) -> Option<&ScenarioAudit> {
        self.scenarios.values().find(|s| s.name == name)
    }

    /// 시나리오에 스텝 결과를 기록하고 상위 결과를 다시 계산합니다.
    ///
    /// `error`가 `Some`이면 `Failed`로 기록되며 메시지가 보존됩니다.
    /// 알 수 없는 `id`이면 `None`을 반환합니다.
    pub fn record_step(
        &mut self,
        id: ScenarioId,
        name: &str,
        description: &str,
        payload: serde_json::Value,
        error: Option<String>,
    ) -> Option<StepResult> {
        let scenario = self.scenarios.get_mut(&id.0)?;
        let result = scenario.record_step(name, description, payload, error);
        self.recompute();
        Some(result)
    }

    /// 프로브 수준의 에러를 기록합니다. 이전 에러는 대체됩니다.
    ///
    /// 시나리오 결과와 별개로 보존되며, 시나리오가 없어도 산출물이 기록됩니다.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// 프로브를 제외됨으로 표시합니다.
    pub fn mark_excluded(&mut self) {
        self.result = AuditResult::Excluded;
    }

    fn recompute(&mut self) {
        if self.result == AuditResult::Excluded {
            return;
        }
        let recorded: Vec<AuditResult> = self
            .scenarios
            .values()
            .map(|s| s.result)
            .filter(|r| *r != AuditResult::NotRun)
            .collect();
        self.result = if recorded.is_empty() {
            AuditResult::NotRun
        } else if recorded.contains(&AuditResult::Failed) {
            AuditResult::Failed
        } else {
            AuditResult::Success
        };
    }

    /// 리소스 생성을 기록합니다.
    pub fn resource_created(&mut self, name: impl Into<String>) {
        self.resources.created.push(name.into());
    }

    /// 리소스 정리를 기록합니다.
    pub fn resource_destroyed(&mut self, name: impl Into<String>) {
        self.resources.destroyed.push(name.into());
    }

    /// 시도된 시나리오 수
    pub fn scenarios_attempted(&self) -> usize {
        self.scenarios.len()
    }

    /// 통과한 시나리오 수
    pub fn scenarios_succeeded(&self) -> usize {
        self.scenarios
            .values()
            .filter(|s| s.result == AuditResult::Success)
            .count()
    }

    /// 실패한 시나리오 수
    pub fn scenarios_failed(&self) -> usize {
        self.scenarios
            .values()
            .filter(|s| s.result == AuditResult::Failed)
            .count()
    }

    /// 모든 시나리오의 실패 스텝 수
    pub fn failed_steps(&self) -> usize {
        self.scenarios.values().map(ScenarioAudit::failed_steps).sum()
    }

    /// 이 프로브의 감사 산출물 경로를 반환합니다.
    pub fn artifact_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", self.name))
    }

    /// 감사 서브트리를 JSON 산출물로 기록합니다.
    ///
    /// 감사가 비활성화되었거나 시나리오와 에러가 모두 없으면 아무것도 쓰지 않고 `Ok(None)`을 반환합니다.
    /// 산출물이 이미 존재하고 덮어쓰기가 허용되지 않으면 [`AuditError::AlreadyExists`]입니다.
    pub fn write(&self, settings: &AuditConfig) -> Result<Option<PathBuf>, AuditError> {
        if !settings.enabled || (self.scenarios.is_empty() && self.error.is_none()) {
            return Ok(None);
        }

        let path = self.artifact_path(&settings.dir);
        let json = serde_json::to_vec_pretty(self).map_err(|e| AuditError::Serialize(e.to_string()))?;

        let mut options = OpenOptions::new();
        options.write(true);
        if settings.overwrite_historical {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let mut file = options.open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => AuditError::AlreadyExists {
                path: path.display().to_string(),
            },
            _ => AuditError::WriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            },
        })?;
        file.write_all(&json)
            .and_then(|()| file.write_all(b"\n"))
            .map_err(|e| AuditError::WriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        info!(probe = %self.name, path = %path.display(), "audit written");
        Ok(Some(path))
    }
}

/// 감사 디렉토리를 만들고 쓰기 가능한지 확인합니다.
pub fn prepare_dir(dir: &Path) -> Result<(), AuditError> {
    let unavailable = |reason: String| AuditError::DirectoryUnavailable {
        path: dir.display().to_string(),
        reason,
    };

    fs::create_dir_all(dir).map_err(|e| unavailable(e.to_string()))?;
    let metadata = fs::metadata(dir).map_err(|e| unavailable(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(unavailable("not a directory".to_owned()));
    }
    if metadata.permissions().readonly() {
        return Err(unavailable("directory is read-only".to_owned()));
    }
    Ok(())
}

/// 기존 이름과 겹치지 않는 이름을 만듭니다 (`base`, `base 2`, `base 3`, ...).
fn unique_name<'a>(existing: impl Iterator<Item = &'a str> + Clone, base: &str) -> String {
    if !existing.clone().any(|n| n == base) {
        return base.to_owned();
    }
    (2..)
        .map(|n| format!("{base} {n}"))
        .find(|candidate| !existing.clone().any(|n| n == candidate))
        .unwrap_or_else(|| base.to_owned())
}
