//! CLI-specific error types and exit code mapping

use probr_core::error::{AuditError, ProbrError, RegistryError};
use probr_service_packs::ServicePackError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to the probr exit code convention,
/// which keeps orchestration and audit faults apart from probe failures.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from probr-core.
    #[error("{0}")]
    Core(#[from] ProbrError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                        |
    /// |------|------------------------------------------------|
    /// | 0    | Every executed probe passed                    |
    /// | 1    | A probe failed (propagated from the runner)    |
    /// | 2    | Configuration or orchestration error           |
    /// | 3    | Audit directory or artifact could not be used  |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Core(ProbrError::Audit(_)) => 3,
            Self::Config(_)
            | Self::Command(_)
            | Self::JsonSerialize(_)
            | Self::Io(_)
            | Self::Core(_) => 2,
        }
    }
}

impl From<ServicePackError> for CliError {
    fn from(e: ServicePackError) -> Self {
        Self::Core(e.into())
    }
}

impl From<AuditError> for CliError {
    fn from(e: AuditError) -> Self {
        Self::Core(ProbrError::Audit(e))
    }
}

impl From<RegistryError> for CliError {
    fn from(e: RegistryError) -> Self {
        Self::Core(ProbrError::Registry(e))
    }
}

#[cfg(test)]
mod tests {
    use probr_core::error::ConfigError;

    use super::*;

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_core_config_error() {
        let err = CliError::Core(ProbrError::Config(ConfigError::ParseFailed {
            reason: "bad toml".to_owned(),
        }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_audit_error() {
        let err: CliError = AuditError::DirectoryUnavailable {
            path: "/proc/audit".to_owned(),
            reason: "read-only".to_owned(),
        }
        .into();
        assert_eq!(err.exit_code(), 3, "audit error should return exit code 3");
    }

    #[test]
    fn test_exit_code_registry_error() {
        let err = CliError::Core(ProbrError::Registry(RegistryError::NotFound {
            name: "missing".to_owned(),
        }));
        assert_eq!(
            err.exit_code(),
            2,
            "orchestration error should return exit code 2"
        );
    }

    #[test]
    fn test_exit_code_never_one() {
        // 1 is reserved for probe failures reported by the runner
        let errors = [
            CliError::Command("x".to_owned()),
            CliError::Io(std::io::Error::other("x")),
            CliError::Config("x".to_owned()),
        ];
        for err in errors {
            assert_ne!(err.exit_code(), 1, "{err} must not use exit code 1");
        }
    }

    #[test]
    fn test_from_service_pack_error() {
        let err: CliError = ServicePackError::Launch {
            probe: "general".to_owned(),
            reason: "godog: not found".to_owned(),
        }
        .into();
        assert!(matches!(err, CliError::Core(ProbrError::Probe(_))));
        assert!(err.to_string().contains("godog: not found"));
    }

    #[test]
    fn test_error_display_config() {
        let err = CliError::Config("invalid TOML syntax".to_owned());
        let display_str = format!("{}", err);
        assert!(display_str.contains("configuration error"));
        assert!(display_str.contains("invalid TOML syntax"));
    }

    #[test]
    fn test_error_display_command() {
        let err = CliError::Command("execution failed".to_owned());
        assert_eq!(err.to_string(), "execution failed");
    }
}
