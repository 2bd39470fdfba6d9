//! Loop parameters from TOML (`[orchestration]` section)

use serde::{Deserialize, Serialize};

/// Raw orchestration configuration from TOML
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOrchestrationConfig {
    /// Confidence recorded when a persona reports none
    pub missing_confidence: f64,
}
