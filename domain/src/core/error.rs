//! Domain error types

use crate::complexity::score::ComplexityLevel;
use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Persona not found: {0}")]
    PersonaNotFound(String),

    #[error("Persona {id} has no version {version}")]
    PersonaVersionNotFound { id: String, version: u32 },

    #[error("No strategy configured for complexity level {0}")]
    MissingStrategy(ComplexityLevel),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Illegal state transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },
}

impl DomainError {
    /// Check if this error indicates a deployment/configuration bug
    /// (as opposed to bad caller input).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DomainError::PersonaNotFound(_)
                | DomainError::PersonaVersionNotFound { .. }
                | DomainError::MissingStrategy(_)
                | DomainError::Configuration(_)
        )
    }
}
