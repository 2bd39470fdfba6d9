//! Complexity analyzer configuration from TOML (`[analyzer]` section)

use middleware_domain::{
    ComplexityAnalyzer, ComplexityWeights, ConfigIssue, ConfigIssueCode, LevelBreakpoints,
};
use serde::{Deserialize, Serialize};

/// Raw analyzer configuration from TOML
///
/// ```toml
/// [analyzer.weights]
/// per_symptom = 5.0
///
/// [analyzer.breakpoints]
/// critical = 80.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAnalyzerConfig {
    pub weights: ComplexityWeights,
    pub breakpoints: LevelBreakpoints,
}

impl FileAnalyzerConfig {
    /// Build the analyzer, reporting out-of-range settings.
    pub fn to_analyzer(&self) -> (ComplexityAnalyzer, Vec<ConfigIssue>) {
        let analyzer = ComplexityAnalyzer::new(self.weights.clone(), self.breakpoints);
        let issues = match analyzer.validate() {
            Ok(()) => Vec::new(),
            Err(e) => vec![ConfigIssue::error(
                ConfigIssueCode::InvalidAnalyzer,
                format!("analyzer: {}", e),
            )],
        };
        (analyzer, issues)
    }
}
