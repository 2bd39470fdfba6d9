//! Strategy table configuration from TOML (`[strategies.<level>]` sections)

use middleware_domain::{ComplexityLevel, ConfigIssue, ConfigIssueCode, Strategy, StrategyTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `[strategies.<level>]` section
///
/// ```toml
/// [strategies.complex]
/// personas = ["soap_editor", "clinical_advisor"]
/// max_rounds = 2
/// confidence_threshold = 0.9
/// allow_refinement = true
/// call_timeout_ms = 45000
/// ```
///
/// Omitted keys fall back to the built-in strategy of the same level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileStrategyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personas: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_refinement: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_timeout_ms: Option<u64>,
}

impl FileStrategyConfig {
    fn from_strategy(strategy: &Strategy) -> Self {
        Self {
            personas: Some(strategy.personas_sequence.clone()),
            max_rounds: Some(strategy.max_rounds),
            confidence_threshold: Some(strategy.confidence_threshold),
            allow_refinement: Some(strategy.allow_refinement),
            call_timeout_ms: Some(strategy.call_timeout_ms),
        }
    }

    fn apply_to(&self, base: &Strategy) -> Strategy {
        let mut strategy = base.clone();
        if let Some(personas) = &self.personas {
            strategy.personas_sequence = personas.clone();
        }
        if let Some(max_rounds) = self.max_rounds {
            strategy.max_rounds = max_rounds;
        }
        if let Some(threshold) = self.confidence_threshold {
            strategy.confidence_threshold = threshold;
        }
        if let Some(allow) = self.allow_refinement {
            strategy.allow_refinement = allow;
        }
        if let Some(timeout_ms) = self.call_timeout_ms {
            strategy.call_timeout_ms = timeout_ms;
        }
        strategy
    }
}

/// All `[strategies.*]` sections keyed by lowercase level name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileStrategiesConfig(pub BTreeMap<String, FileStrategyConfig>);

impl Default for FileStrategiesConfig {
    fn default() -> Self {
        let table = StrategyTable::default();
        Self(
            table
                .iter()
                .map(|s| (s.level.config_key().to_string(), FileStrategyConfig::from_strategy(s)))
                .collect(),
        )
    }
}

impl FileStrategiesConfig {
    /// Build the strategy table.
    ///
    /// Returns `None` when any level is missing or invalid; every problem
    /// found is reported in the issue list.
    pub fn to_strategy_table(&self) -> (Option<StrategyTable>, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let builtin = StrategyTable::default();
        let mut strategies = Vec::new();

        for key in self.0.keys() {
            if key.parse::<ComplexityLevel>().is_err() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidStrategy,
                    format!(
                        "strategies.{}: unknown complexity level (expected simple, moderate, complex or critical)",
                        key
                    ),
                ));
            }
        }

        for level in ComplexityLevel::ALL {
            let Some(section) = self.0.get(level.config_key()) else {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidStrategy,
                    format!("strategies.{}: no strategy configured", level.config_key()),
                ));
                continue;
            };
            let strategy = section.apply_to(builtin.select(level));
            match strategy.validate() {
                Ok(()) => strategies.push(strategy),
                Err(e) => issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidStrategy,
                    format!("strategies.{}: {}", level.config_key(), e),
                )),
            }
        }

        if !issues.is_empty() {
            return (None, issues);
        }
        match StrategyTable::from_strategies(strategies) {
            Ok(table) => (Some(table), issues),
            Err(e) => {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidStrategy,
                    e.to_string(),
                ));
                (None, issues)
            }
        }
    }
}
