//! 에러 타입 — 도메인별 에러 정의
//!
//! [`ProbrError`]는 코어가 호출자에게 돌려주는 최상위 에러입니다.
//! 프로브 자체의 실패(시나리오 단언 실패)는 에러가 아니라 종료 코드로 표현되며,
//! 여기의 에러는 설정, 레지스트리, 감사 기록, 실행 인프라 문제만 다룹니다.

/// Probr 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ProbrError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 프로브 레지스트리 에러
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// 감사 기록 영속화 에러
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// 프로브 실행 인프라 에러
    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 프로브 레지스트리 에러
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// 등록되지 않은 프로브 이름
    #[error("probe '{name}' not found")]
    NotFound { name: String },

    /// 구조적으로 잘못된 프로브 (예: 빈 이름)
    #[error("invalid probe: {reason}")]
    InvalidProbe { reason: String },

    /// 이미 실행 중인 프로브를 다시 실행하려 함
    #[error("probe '{name}' is already running")]
    AlreadyRunning { name: String },

    /// 레지스트리 잠금 오염 (다른 호출자가 잠금 보유 중 패닉)
    #[error("registry lock poisoned")]
    LockPoisoned,
}

/// 감사 기록 에러
///
/// 감사 산출물은 컴플라이언스 증적이므로 모든 변형이 치명적입니다.
/// 프로브의 통과/실패 결과와는 별개로 취급됩니다.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// 감사 디렉토리를 사용할 수 없음
    #[error("audit directory unavailable: {path}: {reason}")]
    DirectoryUnavailable { path: String, reason: String },

    /// 과거 감사 산출물이 이미 존재하고 덮어쓰기가 허용되지 않음
    #[error("audit artifact already exists and overwrite is disabled: {path}")]
    AlreadyExists { path: String },

    /// 감사 산출물 쓰기 실패
    #[error("failed to write audit artifact {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    /// 감사 트리 직렬화 실패
    #[error("failed to serialize audit: {0}")]
    Serialize(String),
}

/// 프로브 실행 인프라 에러
///
/// 프로브 콜백이 의미 있는 종료 코드를 만들기 전에 실패한 경우입니다.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// 외부 러너 실행 실패
    #[error("failed to launch runner for probe '{probe}': {reason}")]
    Launch { probe: String, reason: String },

    /// 러너 결과 보고서 해석 실패
    #[error("failed to read runner report for probe '{probe}': {reason}")]
    Report { probe: String, reason: String },

    /// 기타 실행 에러
    #[error("probe '{probe}' failed: {reason}")]
    Execution { probe: String, reason: String },
}
