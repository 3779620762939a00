//! 설정 관리 — probr.toml 파싱 및 런타임 설정
//!
//! [`ProbrConfig`]는 코어와 서비스 팩이 읽는 모든 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`PROBR_AUDIT_DIR=/tmp/audit` 형식)
//! 3. 설정 파일 (`probr.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), probr_core::error::ProbrError> {
//! use probr_core::config::ProbrConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ProbrConfig::load("probr.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ProbrConfig::parse("[audit]\nenabled = false")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ProbrError};
use crate::types::ServicePack;

/// Probr 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbrConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 감사 산출물 설정
    #[serde(default)]
    pub audit: AuditConfig,
    /// 요약 출력 설정
    #[serde(default)]
    pub summary: SummaryConfig,
    /// 외부 BDD 러너 설정
    #[serde(default)]
    pub runner: RunnerConfig,
    /// 전역 제외 설정
    #[serde(default)]
    pub exclusions: ExclusionConfig,
    /// 서비스 팩별 설정
    #[serde(default)]
    pub service_packs: Vec<ServicePackConfig>,
}

impl ProbrConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ProbrError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ProbrError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProbrError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ProbrError::Io(e)
            }
        })?;
        if metadata.is_dir() {
            return Err(ConfigError::InvalidValue {
                field: "config".to_owned(),
                reason: format!("'{}' is a directory, not a normal file", path.display()),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ProbrError> {
        toml::from_str(toml_str).map_err(|e| {
            ProbrError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PROBR_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "PROBR_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "PROBR_GENERAL_LOG_FORMAT");

        // Audit
        override_bool(&mut self.audit.enabled, "PROBR_AUDIT_ENABLED");
        override_path(&mut self.audit.dir, "PROBR_AUDIT_DIR");
        override_bool(
            &mut self.audit.overwrite_historical,
            "PROBR_AUDIT_OVERWRITE_HISTORICAL",
        );

        // Summary
        override_bool(&mut self.summary.enabled, "PROBR_SUMMARY_ENABLED");

        // Runner
        override_string(&mut self.runner.command, "PROBR_RUNNER_COMMAND");
        override_path(&mut self.runner.features_dir, "PROBR_RUNNER_FEATURES_DIR");
        override_string(&mut self.runner.tags, "PROBR_RUNNER_TAGS");
        override_string(&mut self.runner.output_dir, "PROBR_RUNNER_OUTPUT_DIR");

        // Exclusions
        override_csv(&mut self.exclusions.tags, "PROBR_EXCLUSIONS_TAGS");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ProbrError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.audit.enabled && self.audit.dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "audit.dir".to_owned(),
                reason: "audit dir must not be empty when audit is enabled".to_owned(),
            }
            .into());
        }

        // 러너 원본 출력이 감사 산출물을 덮어쓰지 않도록 디렉토리를 분리합니다
        if self.audit.enabled
            && !self.runner.output_dir.is_empty()
            && Path::new(&self.runner.output_dir) == self.audit.dir
        {
            return Err(ConfigError::InvalidValue {
                field: "runner.output_dir".to_owned(),
                reason: format!(
                    "must differ from audit.dir ({})",
                    self.audit.dir.display()
                ),
            }
            .into());
        }

        if self.runner.command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "runner.command".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        for (idx, pack) in self.service_packs.iter().enumerate() {
            if pack.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("service_packs[{idx}].name"),
                    reason: "service pack name must not be empty".to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// 이름으로 서비스 팩 설정을 찾습니다.
    pub fn service_pack(&self, pack: &ServicePack) -> Option<&ServicePackConfig> {
        self.service_packs
            .iter()
            .find(|p| p.name.parse::<ServicePack>().ok().as_ref() == Some(pack))
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 감사 산출물 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// 감사 산출물 기록 여부
    pub enabled: bool,
    /// 감사 산출물 디렉토리 (프로브당 JSON 파일 하나)
    pub dir: PathBuf,
    /// 기존 감사 산출물 덮어쓰기 허용 여부
    pub overwrite_historical: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("probr_output/audit"),
            overwrite_historical: false,
        }
    }
}

/// 요약 출력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// 실행 종료 시 요약을 표준 출력에 기록할지 여부
    pub enabled: bool,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// 외부 BDD 러너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// 러너 실행 파일
    pub command: String,
    /// 러너에 항상 전달되는 인자
    pub args: Vec<String>,
    /// feature 파일 루트 디렉토리
    pub features_dir: PathBuf,
    /// 러너에 전달할 기본 태그 표현식
    pub tags: String,
    /// 프로브별 원본 결과를 저장할 디렉토리 (비어있으면 저장하지 않음)
    pub output_dir: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: "godog".to_owned(),
            args: vec!["--format".to_owned(), "cucumber".to_owned()],
            features_dir: PathBuf::from("features"),
            tags: String::new(),
            output_dir: String::new(),
        }
    }
}

/// 전역 제외 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// 제외할 태그 목록 (`@` 접두어는 선택)
    pub tags: Vec<String>,
}

/// 서비스 팩 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicePackConfig {
    /// 서비스 팩 이름 (kubernetes, storage, opa)
    pub name: String,
    /// 팩 전체 제외 여부
    pub excluded: bool,
    /// 제외 사유
    pub justification: String,
    /// 클라우드 제공자 (storage, opa 팩은 설정되어야 프로브가 등록됨)
    pub provider: String,
    /// 프로브별 설정
    pub probes: Vec<ProbeConfig>,
}

/// 프로브 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// 프로브 이름
    pub name: String,
    /// 제외 여부
    pub excluded: bool,
    /// 제외 사유
    pub justification: String,
    /// 시나리오별 설정
    pub scenarios: Vec<ScenarioConfig>,
}

/// 시나리오 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// 시나리오 이름 또는 태그
    pub name: String,
    /// 제외 여부
    pub excluded: bool,
    /// 제외 사유
    pub justification: String,
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_path(target: &mut PathBuf, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = PathBuf::from(val);
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_is_valid() {
        let config = ProbrConfig::default();
        config.validate().expect("default config should validate");
        assert!(config.audit.enabled);
        assert!(!config.audit.overwrite_historical);
        assert!(config.summary.enabled);
        assert_eq!(config.runner.command, "godog");
    }

    #[test]
    fn parse_empty_string_uses_defaults() {
        let config = ProbrConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert!(config.service_packs.is_empty());
    }

    #[test]
    fn parse_service_packs_and_exclusions() {
        let toml = r#"
[exclusions]
tags = ["@k-psp-001"]

[[service_packs]]
name = "kubernetes"

[[service_packs.probes]]
name = "pod_security_policy"
excluded = true
justification = "not in scope"

[[service_packs.probes.scenarios]]
name = "k-gen-002"
excluded = true
justification = "known"
"#;
        let config = ProbrConfig::parse(toml).unwrap();
        assert_eq!(config.exclusions.tags, vec!["@k-psp-001"]);
        let pack = config.service_pack(&ServicePack::Kubernetes).unwrap();
        assert_eq!(pack.probes.len(), 1);
        assert!(pack.probes[0].excluded);
        assert_eq!(pack.probes[0].scenarios[0].name, "k-gen-002");
    }

    #[test]
    fn parse_invalid_toml_fails() {
        let err = ProbrConfig::parse("[audit\nenabled = true").unwrap_err();
        assert!(matches!(
            err,
            ProbrError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_unknown_log_level() {
        let mut config = ProbrConfig::default();
        config.general.log_level = "verbose".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_runner_command() {
        let mut config = ProbrConfig::default();
        config.runner.command = "  ".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("runner.command"));
    }

    #[test]
    fn validate_rejects_empty_audit_dir_when_enabled() {
        let mut config = ProbrConfig::default();
        config.audit.dir = PathBuf::new();
        assert!(config.validate().is_err());
        config.audit.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_output_dir_shared_with_audit_dir() {
        let mut config = ProbrConfig::default();
        config.audit.dir = PathBuf::from("probr_output/audit");
        config.runner.output_dir = "probr_output/audit/".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("runner.output_dir"));

        config.runner.output_dir = "probr_output/results".to_owned();
        assert!(config.validate().is_ok());

        // 감사가 꺼져 있으면 덮어쓸 산출물이 없다
        config.runner.output_dir = "probr_output/audit".to_owned();
        config.audit.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unnamed_service_pack() {
        let mut config = ProbrConfig::default();
        config.service_packs.push(ServicePackConfig::default());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("service_packs[0].name"));
    }

    #[test]
    #[serial]
    fn env_overrides_audit_and_summary() {
        // SAFETY: serial 테스트에서만 환경변수를 변경합니다.
        unsafe {
            std::env::set_var("PROBR_AUDIT_DIR", "/tmp/probr-audit");
            std::env::set_var("PROBR_SUMMARY_ENABLED", "false");
            std::env::set_var("PROBR_EXCLUSIONS_TAGS", "@a, @b ,");
        }

        let mut config = ProbrConfig::default();
        config.apply_env_overrides();

        // SAFETY: 테스트 정리
        unsafe {
            std::env::remove_var("PROBR_AUDIT_DIR");
            std::env::remove_var("PROBR_SUMMARY_ENABLED");
            std::env::remove_var("PROBR_EXCLUSIONS_TAGS");
        }

        assert_eq!(config.audit.dir, PathBuf::from("/tmp/probr-audit"));
        assert!(!config.summary.enabled);
        assert_eq!(config.exclusions.tags, vec!["@a", "@b"]);
    }

    #[test]
    #[serial]
    fn env_override_ignores_unparseable_bool() {
        // SAFETY: serial 테스트에서만 환경변수를 변경합니다.
        unsafe {
            std::env::set_var("PROBR_AUDIT_ENABLED", "maybe");
        }
        let mut config = ProbrConfig::default();
        config.apply_env_overrides();
        // SAFETY: 테스트 정리
        unsafe {
            std::env::remove_var("PROBR_AUDIT_ENABLED");
        }
        assert!(config.audit.enabled);
    }

    #[tokio::test]
    async fn from_file_reports_missing_file() {
        let err = ProbrConfig::from_file("/nonexistent/probr.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProbrError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn from_file_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProbrConfig::from_file(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("is a directory"));
    }
}
