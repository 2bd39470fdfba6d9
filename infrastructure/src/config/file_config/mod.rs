//! Raw TOML configuration data types
//!
//! These structs mirror the config file layout. Domain value types
//! (`PersonaConfig`, `RetryPolicy`, analyzer weights) are deserialized
//! directly where their shape matches the file.

mod analyzer;
mod gateway;
mod orchestration;
mod output;
mod personas;
mod strategies;
mod trace;

pub use analyzer::FileAnalyzerConfig;
pub use gateway::FileGatewayConfig;
pub use orchestration::FileOrchestrationConfig;
pub use output::FileOutputConfig;
pub use personas::default_personas;
pub use strategies::{FileStrategiesConfig, FileStrategyConfig};
pub use trace::FileTraceConfig;

use middleware_application::ExecutionParams;
use middleware_domain::{
    ComplexityAnalyzer, ConfigIssue, ConfigIssueCode, DomainError, PersonaConfig, PersonaRegistry,
    RetryPolicy, StrategyTable,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Complexity scoring weights and level breakpoints
    pub analyzer: FileAnalyzerConfig,
    /// One strategy per complexity level
    pub strategies: FileStrategiesConfig,
    /// Backoff for transient gateway failures
    pub retry: RetryPolicy,
    pub orchestration: FileOrchestrationConfig,
    /// LLM endpoint settings
    pub gateway: FileGatewayConfig,
    /// JSONL audit trace settings
    pub trace: FileTraceConfig,
    pub output: FileOutputConfig,
    /// Persona definitions (registered as version 1 at startup)
    pub personas: Vec<PersonaConfig>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            analyzer: FileAnalyzerConfig::default(),
            strategies: FileStrategiesConfig::default(),
            retry: RetryPolicy::default(),
            orchestration: FileOrchestrationConfig::default(),
            gateway: FileGatewayConfig::default(),
            trace: FileTraceConfig::default(),
            output: FileOutputConfig::default(),
            personas: default_personas(),
        }
    }
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Checks, in order: analyzer ranges, the strategy table, retry
    /// settings, persona definitions, cross-references between strategies
    /// and personas, and whether an API key can be resolved.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        issues.extend(self.analyzer.to_analyzer().1);

        let (table, strategy_issues) = self.strategies.to_strategy_table();
        issues.extend(strategy_issues);

        if let Err(e) = self.retry.validate() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidRetry,
                format!("retry: {}", e),
            ));
        }

        let mut defined = BTreeSet::new();
        for persona in &self.personas {
            if let Err(e) = persona.validate() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidPersona,
                    format!("personas: {}", e),
                ));
            }
            if !defined.insert(persona.id.as_str()) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::DuplicatePersona,
                    format!("personas: '{}' is defined more than once", persona.id),
                ));
            }
        }

        if let Some(table) = &table {
            let referenced = table.persona_ids();
            for strategy in table.iter() {
                for id in &strategy.personas_sequence {
                    if !defined.contains(id.as_str()) {
                        issues.push(ConfigIssue::error(
                            ConfigIssueCode::UnregisteredPersona,
                            format!(
                                "strategies.{}: persona '{}' is not defined in [[personas]]",
                                strategy.level.config_key(),
                                id
                            ),
                        ));
                    }
                }
            }
            for id in defined.difference(&referenced) {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::UnusedPersona,
                    format!("personas: '{}' is not used by any strategy", id),
                ));
            }
        }

        if self.gateway.resolve_api_key().is_none() {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::MissingApiKey,
                format!(
                    "gateway: no api_key set and ${} is empty",
                    self.gateway.api_key_env
                ),
            ));
        }

        issues
    }

    pub fn to_analyzer(&self) -> ComplexityAnalyzer {
        self.analyzer.to_analyzer().0
    }

    pub fn to_strategy_table(&self) -> Result<StrategyTable, DomainError> {
        let (table, issues) = self.strategies.to_strategy_table();
        table.ok_or_else(|| {
            let messages: Vec<_> = issues.into_iter().map(|i| i.message).collect();
            DomainError::Configuration(messages.join("; "))
        })
    }

    pub fn to_registry(&self) -> Result<PersonaRegistry, DomainError> {
        PersonaRegistry::with_personas(self.personas.iter().cloned())
    }

    pub fn to_execution_params(&self) -> ExecutionParams {
        ExecutionParams::default()
            .with_retry(self.retry)
            .with_missing_confidence(self.orchestration.missing_confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use middleware_domain::{ComplexityLevel, Severity, has_errors};

    fn with_key(mut config: FileConfig) -> FileConfig {
        config.gateway.api_key = Some("sk-test".to_string());
        config
    }

    #[test]
    fn test_default_config_is_valid() {
        let issues = with_key(FileConfig::default()).validate();
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_empty_file_parses_to_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_builders_from_defaults() {
        let config = FileConfig::default();
        let table = config.to_strategy_table().unwrap();
        let registry = config.to_registry().unwrap();
        assert!(
            registry
                .ensure_registered(table.persona_ids().into_iter())
                .is_ok()
        );
        assert_eq!(registry.get("soap_editor").unwrap().version, 1);
        assert_eq!(config.to_execution_params().retry.max_retries, 2);
    }

    #[test]
    fn test_strategy_referencing_undefined_persona() {
        let mut config = with_key(FileConfig::default());
        config.strategies.0.get_mut("simple").unwrap().personas =
            Some(vec!["triage_editor".to_string()]);

        let issues = config.validate();
        assert!(has_errors(&issues));
        assert!(issues.iter().any(|i| {
            i.code == ConfigIssueCode::UnregisteredPersona && i.message.contains("triage_editor")
        }));
    }

    #[test]
    fn test_duplicate_and_unused_personas() {
        let mut config = with_key(FileConfig::default());
        config.personas.push(config.personas[0].clone());
        config
            .personas
            .push(PersonaConfig::new("coding_advisor", "gpt-4.1"));

        let issues = config.validate();
        let duplicate = issues
            .iter()
            .find(|i| i.code == ConfigIssueCode::DuplicatePersona)
            .unwrap();
        assert_eq!(duplicate.severity, Severity::Error);
        let unused = issues
            .iter()
            .find(|i| i.code == ConfigIssueCode::UnusedPersona)
            .unwrap();
        assert_eq!(unused.severity, Severity::Warning);
        assert!(unused.message.contains("coding_advisor"));
    }

    #[test]
    fn test_bad_retry_and_missing_key() {
        let mut config = FileConfig::default();
        config.retry.factor = 0.5;
        config.gateway.api_key_env = "MIDDLEWARE_TEST_UNSET_KEY_VAR".to_string();

        let issues = config.validate();
        assert!(issues.iter().any(|i| i.code == ConfigIssueCode::InvalidRetry));
        let missing = issues
            .iter()
            .find(|i| i.code == ConfigIssueCode::MissingApiKey)
            .unwrap();
        assert!(!missing.is_error());
    }

    #[test]
    fn test_full_file() {
        let toml_str = r#"
[analyzer.breakpoints]
moderate = 20.0

[strategies.simple]
confidence_threshold = 0.75

[strategies.moderate]
[strategies.complex]
[strategies.critical]

[retry]
max_retries = 4

[orchestration]
missing_confidence = 0.1

[gateway]
base_url = "http://localhost:8080/v1"
api_key = "local"

[trace]
enabled = false
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_empty());
        assert_eq!(config.to_analyzer().breakpoints.moderate, 20.0);
        let table = config.to_strategy_table().unwrap();
        assert_eq!(table.select(ComplexityLevel::Simple).confidence_threshold, 0.75);
        let params = config.to_execution_params();
        assert_eq!(params.retry.max_retries, 4);
        assert_eq!(params.retry.base_delay_ms, 500);
        assert_eq!(params.missing_confidence, 0.1);
        assert!(config.trace.resolved_path().is_none());
    }
}
