//! Error types for gridx specs.

use thiserror::Error;

/// Result type alias for spec-level operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// Errors raised while building or validating application specs.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("invalid run config: {0}")]
    InvalidRunConfig(#[from] ConfigError),

    #[error("malformed app handle `{handle}`: {reason}")]
    MalformedAppHandle { handle: String, reason: String },

    #[error("unknown named resource `{0}`")]
    UnknownResource(String),

    #[error("invalid app definition: {0}")]
    InvalidApp(String),

    #[error("invalid mount `{mount}`: {reason}")]
    InvalidMount { mount: String, reason: String },

    #[error("invalid value `{value}` for option `{option}`: {reason}")]
    InvalidConfigValue {
        option: String,
        value: String,
        reason: String,
    },

    #[error("config file error: {0}")]
    ConfigFile(String),
}

impl SpecError {
    pub(crate) fn malformed_handle(handle: &str, reason: impl Into<String>) -> Self {
        SpecError::MalformedAppHandle {
            handle: handle.to_string(),
            reason: reason.into(),
        }
    }
}

/// A single reason a run config failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigViolation {
    /// A required option without a default was not supplied.
    #[error("required option `{option}` is missing{}", help_suffix(.help))]
    Missing { option: String, help: String },
    /// The supplied value does not have the declared type.
    #[error("option `{option}` expects {expected}, got {actual}")]
    TypeMismatch {
        option: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl ConfigViolation {
    /// Name of the offending option.
    pub fn option(&self) -> &str {
        match self {
            ConfigViolation::Missing { option, .. } => option,
            ConfigViolation::TypeMismatch { option, .. } => option,
        }
    }
}

fn help_suffix(help: &str) -> String {
    if help.is_empty() {
        String::new()
    } else {
        format!(" ({help})")
    }
}

/// Every violation found while validating a run config against its schema.
///
/// Violations are ordered by option name, so two validations of the same
/// config against the same schema always report the same list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_violations(.violations))]
pub struct ConfigError {
    pub violations: Vec<ConfigViolation>,
}

impl ConfigError {
    /// Whether `option` is among the violations.
    pub fn mentions(&self, option: &str) -> bool {
        self.violations.iter().any(|v| v.option() == option)
    }
}

fn join_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
