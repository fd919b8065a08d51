use std::path::PathBuf;
use thiserror::Error;

/// Why a token could not be turned into a [`DomainKey`](crate::domain::model::DomainKey).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidDomainReason {
    #[error("no labels left after normalization")]
    Empty,

    #[error("contains whitespace")]
    Whitespace,

    #[error("not valid UTF-8")]
    NotUtf8,

    #[error("cannot be IDNA encoded")]
    Idna,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid domain {input:?}: {reason}")]
pub struct InvalidDomain {
    pub input: String,
    pub reason: InvalidDomainReason,
}

impl InvalidDomain {
    pub fn new(input: impl Into<String>, reason: InvalidDomainReason) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }
}

/// Failure to obtain the content of one remote source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("cache error for {url}: {source}")]
    Cache {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum DnsgateError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field}: {value:?} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error(transparent)]
    FetchError(#[from] FetchError),

    #[error(transparent)]
    InvalidDomain(#[from] InvalidDomain),

    #[error("Failed to write {}: {source}", path.display())]
    OutputWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The list of domains to block is empty")]
    EmptyRuleSet,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Source,
    Network,
    Data,
    Output,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DnsgateError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::TomlParseError(_)
            | Self::TomlSerializeError(_) => ErrorCategory::Configuration,
            Self::SourceNotFound { .. } => ErrorCategory::Source,
            Self::FetchError(_) => ErrorCategory::Network,
            Self::InvalidDomain(_) | Self::EmptyRuleSet => ErrorCategory::Data,
            Self::OutputWriteError { .. } => ErrorCategory::Output,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidDomain(_) | Self::SourceNotFound { .. } => ErrorSeverity::Low,
            Self::FetchError(_) | Self::EmptyRuleSet => ErrorSeverity::Medium,
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::TomlParseError(_)
            | Self::TomlSerializeError(_)
            | Self::OutputWriteError { .. } => ErrorSeverity::High,
            Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::ConfigError { .. } | Self::ConfigValidationError { .. } => {
                "Run \"dnsgate configure --help\" and rewrite the configuration".to_string()
            }
            Self::InvalidConfigValueError { field, .. } => {
                format!("Fix the value of '{}' in the configuration file", field)
            }
            Self::MissingConfigError { field } => format!(
                "Run \"dnsgate configure\" to create {}, or point --config at an existing file",
                field
            ),
            Self::SourceNotFound { path } => format!(
                "Create {} or run \"dnsgate configure\" to write the default lists",
                path.display()
            ),
            Self::FetchError(_) => {
                "Check network connectivity and the source URL, or retry later".to_string()
            }
            Self::InvalidDomain(_) => "Remove or correct the malformed entry".to_string(),
            Self::OutputWriteError { source, path } => {
                if source.kind() == std::io::ErrorKind::PermissionDenied {
                    format!(
                        "Writing {} needs elevated privileges, re-run as root or choose another output path",
                        path.display()
                    )
                } else {
                    format!("Make sure the directory of {} exists and is writable", path.display())
                }
            }
            Self::EmptyRuleSet => {
                "Add remote sources with \"dnsgate configure\" or domains with \"dnsgate block\""
                    .to_string()
            }
            Self::IoError(_) => "Check file permissions and available disk space".to_string(),
            Self::TomlParseError(_) => {
                "Fix the syntax of the configuration file or regenerate it with \"dnsgate configure\""
                    .to_string()
            }
            Self::TomlSerializeError(_) => {
                "Report this as a bug; the configuration could not be serialized".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ConfigError { message } => format!("Invalid configuration: {}", message),
            Self::ConfigValidationError { field, message } => {
                format!("Configuration problem in {}: {}", field, message)
            }
            Self::InvalidConfigValueError { field, value, reason } => {
                format!("'{}' has an invalid value \"{}\": {}", field, value, reason)
            }
            Self::MissingConfigError { field } => format!("{} is not configured", field),
            Self::SourceNotFound { path } => format!("{} is missing", path.display()),
            Self::FetchError(e) => format!("Could not download a blocklist: {}", e),
            Self::InvalidDomain(e) => format!("Skipped {}", e),
            Self::OutputWriteError { path, .. } => {
                format!("Could not write the rule file {}", path.display())
            }
            Self::EmptyRuleSet => "Nothing to block, no output was written".to_string(),
            Self::IoError(e) => format!("File system error: {}", e),
            Self::TomlParseError(e) => format!("Could not read the configuration: {}", e),
            Self::TomlSerializeError(e) => format!("Could not save the configuration: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, DnsgateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_write_permission_hint() {
        let err = DnsgateError::OutputWriteError {
            path: PathBuf::from("/etc/dnsgate/generated_blacklist"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.category(), ErrorCategory::Output);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.recovery_suggestion().contains("elevated privileges"));
    }

    #[test]
    fn test_recoverable_errors_are_low_severity() {
        let invalid = DnsgateError::from(InvalidDomain::new("a b", InvalidDomainReason::Whitespace));
        let missing = DnsgateError::SourceNotFound {
            path: PathBuf::from("/etc/dnsgate/whitelist"),
        };
        assert_eq!(invalid.severity(), ErrorSeverity::Low);
        assert_eq!(missing.severity(), ErrorSeverity::Low);
        assert_eq!(missing.category(), ErrorCategory::Source);
    }

    #[test]
    fn test_configuration_errors_are_fatal() {
        let err = DnsgateError::config("block_at_psl is not possible in hosts mode");
        assert!(err.severity() >= ErrorSeverity::High);
        assert!(err.user_friendly_message().contains("hosts mode"));
    }
}
