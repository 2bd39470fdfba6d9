//! Startup configuration issues.
//!
//! Configuration is checked once when the process starts; each problem found
//! is reported as a [`ConfigIssue`] so the caller can print all of them
//! before deciding whether to abort.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The middleware cannot start with this configuration.
    Error,
    /// Starts, but probably not as intended.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// Analyzer weights or breakpoints are out of range.
    InvalidAnalyzer,
    /// A strategy is malformed (empty sequence, threshold out of range, ...).
    InvalidStrategy,
    /// A strategy names a persona that is not configured.
    UnregisteredPersona,
    /// A persona definition is malformed.
    InvalidPersona,
    /// The same persona id is defined more than once.
    DuplicatePersona,
    /// A persona is configured but no strategy uses it.
    UnusedPersona,
    /// Retry settings are out of range.
    InvalidRetry,
    /// The gateway has no API key configured.
    MissingApiKey,
}

/// A detected configuration issue.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Whether any issue in the list is fatal.
pub fn has_errors(issues: &[ConfigIssue]) -> bool {
    issues.iter().any(ConfigIssue::is_error)
}
