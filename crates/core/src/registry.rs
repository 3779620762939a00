//! 프로브 레지스트리 — 이름으로 프로브를 관리하고 순차 실행
//!
//! [`ProbeRegistry`]는 프로브 이름 → [`RegisteredProbe`] 매핑을 하나의 `RwLock`으로 보호합니다.
//! 등록 시점에 [`ExclusionPolicy`]를 적용해 초기 상태(`Pending` 또는 `Excluded`)를 정합니다.
//!
//! # 실행
//! 프로브는 한 번에 하나씩 실행됩니다. 핸들러를 호출하는 동안에는 잠금을 잡지 않으므로
//! 실행 중에도 다른 호출자가 상태와 결과를 조회할 수 있습니다.
//! 실행 순서는 보장되지 않습니다.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{ProbrError, RegistryError};
use crate::exclusion::ExclusionPolicy;
use crate::runner::{self, ProbeHandler};
use crate::summary::RunAudit;
use crate::types::{EXIT_INTERNAL_ERROR, ProbeDescriptor, ProbeStatus};

// ─── RegisteredProbe ─────────────────────────────────────────────────

/// 레지스트리에 등록된 프로브
///
/// 복제 비용이 낮습니다 (핸들러와 결과 버퍼는 참조 카운트 공유).
#[derive(Clone)]
pub struct RegisteredProbe {
    /// 프로브 식별자
    pub descriptor: ProbeDescriptor,
    /// 현재 상태
    pub status: ProbeStatus,
    /// 마지막 실행의 출력
    pub results: Option<Bytes>,
    /// 실행 콜백
    pub handler: Arc<dyn ProbeHandler>,
}

impl RegisteredProbe {
    /// `Pending` 상태의 프로브를 생성합니다.
    pub fn new(descriptor: ProbeDescriptor, handler: Arc<dyn ProbeHandler>) -> Self {
        Self {
            descriptor,
            status: ProbeStatus::Pending,
            results: None,
            handler,
        }
    }
}

impl fmt::Debug for RegisteredProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredProbe")
            .field("descriptor", &self.descriptor)
            .field("status", &self.status)
            .field("results", &self.results.as_ref().map(Bytes::len))
            .finish_non_exhaustive()
    }
}

/// 목록 조회용 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeListing {
    /// 프로브 식별자
    pub descriptor: ProbeDescriptor,
    /// 현재 상태
    pub status: ProbeStatus,
}

// ─── ProbeRegistry ───────────────────────────────────────────────────

/// 프로브 레지스트리
pub struct ProbeRegistry {
    policy: ExclusionPolicy,
    probes: RwLock<HashMap<String, RegisteredProbe>>,
}

impl ProbeRegistry {
    /// 주어진 제외 정책으로 빈 레지스트리를 생성합니다.
    pub fn new(policy: ExclusionPolicy) -> Self {
        Self {
            policy,
            probes: RwLock::new(HashMap::new()),
        }
    }

    /// 제외 정책을 반환합니다.
    pub fn policy(&self) -> &ExclusionPolicy {
        &self.policy
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, RegisteredProbe>>, RegistryError> {
        self.probes.read().map_err(|_| RegistryError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, RegisteredProbe>>, RegistryError> {
        self.probes.write().map_err(|_| RegistryError::LockPoisoned)
    }

    /// 프로브를 등록하고 초기 상태를 반환합니다.
    ///
    /// 같은 이름이 이미 있으면 덮어씁니다 (마지막 등록 우선).
    ///
    /// # Errors
    /// 이름이 비어 있으면 [`RegistryError::InvalidProbe`]
    pub fn register(
        &self,
        descriptor: ProbeDescriptor,
        handler: Arc<dyn ProbeHandler>,
    ) -> Result<ProbeStatus, RegistryError> {
        if !descriptor.is_valid() {
            return Err(RegistryError::InvalidProbe {
                reason: format!("probe in pack '{}' has an empty name", descriptor.service_pack),
            });
        }

        let mut probe = RegisteredProbe::new(descriptor, handler);
        if self.policy.is_excluded(&probe.descriptor) {
            probe.status = ProbeStatus::Excluded;
        }
        let status = probe.status;
        let name = probe.descriptor.name.clone();

        let previous = self.write()?.insert(name.clone(), probe);
        if previous.is_some() {
            warn!(probe = %name, "probe re-registered, replacing previous entry");
        }
        info!(probe = %name, status = %status, "probe registered");
        Ok(status)
    }

    /// 이름으로 프로브 스냅샷을 조회합니다.
    pub fn get(&self, name: &str) -> Result<RegisteredProbe, RegistryError> {
        self.read()?
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_owned(),
            })
    }

    /// 프로브의 현재 상태를 조회합니다.
    pub fn status(&self, name: &str) -> Result<ProbeStatus, RegistryError> {
        Ok(self.get(name)?.status)
    }

    /// 프로브의 마지막 실행 출력을 조회합니다.
    pub fn results(&self, name: &str) -> Result<Option<Bytes>, RegistryError> {
        Ok(self.get(name)?.results)
    }

    /// 출력이 있는 모든 프로브의 결과를 이름순으로 반환합니다.
    pub fn all_results(&self) -> Result<BTreeMap<String, String>, RegistryError> {
        Ok(self
            .read()?
            .iter()
            .filter_map(|(name, p)| {
                p.results
                    .as_ref()
                    .map(|r| (name.clone(), String::from_utf8_lossy(r).into_owned()))
            })
            .collect())
    }

    /// 등록된 프로브 이름 (이름순)
    pub fn names(&self) -> Result<Vec<String>, RegistryError> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// 등록된 프로브 수
    pub fn len(&self) -> Result<usize, RegistryError> {
        Ok(self.read()?.len())
    }

    /// 등록된 프로브가 없는지 확인합니다.
    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.read()?.is_empty())
    }

    /// 모든 프로브의 식별자와 상태 스냅샷 (서비스 팩, 이름순)
    pub fn list(&self) -> Result<Vec<ProbeListing>, RegistryError> {
        let mut listings: Vec<ProbeListing> = self
            .read()?
            .values()
            .map(|p| ProbeListing {
                descriptor: p.descriptor.clone(),
                status: p.status,
            })
            .collect();
        listings.sort_by(|a, b| {
            (&a.descriptor.service_pack, &a.descriptor.name)
                .cmp(&(&b.descriptor.service_pack, &b.descriptor.name))
        });
        Ok(listings)
    }

    /// 이름으로 프로브 하나를 실행하고 종료 코드를 반환합니다.
    ///
    /// 제외된 프로브는 핸들러를 호출하지 않고 `Ok(0)`을 반환합니다.
    /// 실행 결과는 `run`에 완료 처리되며 감사 산출물이 기록됩니다.
    ///
    /// # Errors
    /// - 등록되지 않은 이름: [`RegistryError::NotFound`]
    /// - 이미 실행 중: [`RegistryError::AlreadyRunning`]
    /// - 감사 산출물 기록 실패: [`ProbrError::Audit`]
    pub fn execute(&self, name: &str, run: &mut RunAudit) -> Result<i32, ProbrError> {
        let mut probe = {
            let mut probes = self.write()?;
            let entry = probes.get_mut(name).ok_or_else(|| RegistryError::NotFound {
                name: name.to_owned(),
            })?;

            if entry.status == ProbeStatus::Excluded {
                let descriptor = entry.descriptor.clone();
                drop(probes);
                info!(probe = %descriptor, "probe excluded, skipping");
                run.complete(&descriptor, ProbeStatus::Excluded)?;
                return Ok(0);
            }
            if !entry.status.can_transition_to(ProbeStatus::Running) {
                return Err(RegistryError::AlreadyRunning {
                    name: name.to_owned(),
                }
                .into());
            }

            entry.status = ProbeStatus::Running;
            entry.clone()
        };

        let audit = run.probe_handle(&probe.descriptor);
        let outcome = runner::run_probe(Some(&mut probe), audit);

        {
            let mut probes = self.write()?;
            if let Some(entry) = probes.get_mut(name) {
                entry.status = probe.status;
                entry.results = probe.results.clone();
            }
        }

        run.complete_with_error(&probe.descriptor, probe.status, outcome.error)?;
        Ok(outcome.exit_code)
    }

    /// 등록된 모든 프로브를 순차 실행하고 가장 큰 종료 코드를 반환합니다.
    ///
    /// 프로브 하나의 에러는 로그로 남기고 나머지를 계속 실행합니다.
    /// 감사 산출물 기록 실패는 컴플라이언스 증적 손실이므로 즉시 반환합니다.
    /// 모든 프로브가 끝나면 `run`의 전체 상태를 계산합니다.
    pub fn execute_all(&self, run: &mut RunAudit) -> Result<i32, ProbrError> {
        let names = self.names()?;
        info!(count = names.len(), "executing all probes");
        self.execute_selected(&names, run)
    }

    /// 지정한 프로브들만 순차 실행하고 가장 큰 종료 코드를 반환합니다.
    ///
    /// 에러 처리와 전체 상태 계산은 [`execute_all`](Self::execute_all)과 같습니다.
    /// 등록되지 않은 이름은 내부 오류 종료 코드로 집계됩니다.
    pub fn execute_selected<S: AsRef<str>>(
        &self,
        names: &[S],
        run: &mut RunAudit,
    ) -> Result<i32, ProbrError> {
        let mut max_code = 0;
        for name in names.iter().map(AsRef::as_ref) {
            let code = match self.execute(name, run) {
                Ok(code) => code,
                Err(e @ ProbrError::Audit(_)) => {
                    error!(probe = %name, error = %e, "audit persistence failed, aborting run");
                    return Err(e);
                }
                Err(e) => {
                    error!(probe = %name, error = %e, "probe execution error, continuing");
                    EXIT_INTERNAL_ERROR
                }
            };
            max_code = max_code.max(code);
        }

        run.set_overall_status();
        info!(exit_code = max_code, status = %run.status(), "all probes executed");
        Ok(max_code)
    }
}

impl fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeRegistry")
            .field("policy", &self.policy)
            .field("probes", &self.len().ok())
            .finish()
    }
}
