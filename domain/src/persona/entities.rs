//! Persona configuration entity.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// An (input, output) demonstration pair sent ahead of the real input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub input: String,
    pub output: String,
}

impl FewShotExample {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Versioned LLM configuration of one persona (Entity)
///
/// `version` is assigned by the [`PersonaRegistry`](super::registry::PersonaRegistry);
/// a freshly built config carries version 0 until it is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub id: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub examples: Vec<FewShotExample>,
    #[serde(default)]
    pub version: u32,
}

fn default_temperature() -> f64 {
    0.2
}

fn default_max_tokens() -> u32 {
    2048
}

impl PersonaConfig {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: String::new(),
            examples: Vec::new(),
            version: 0,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_example(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.examples.push(FewShotExample::new(input, output));
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.trim().is_empty() {
            return Err(DomainError::Configuration(
                "persona id must not be empty".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(DomainError::Configuration(format!(
                "persona '{}' has no model",
                self.id
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(DomainError::Configuration(format!(
                "persona '{}' temperature must be within 0..=2 (got {})",
                self.id, self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(DomainError::Configuration(format!(
                "persona '{}' max_tokens must be positive",
                self.id
            )));
        }
        Ok(())
    }
}
