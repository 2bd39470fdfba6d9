//! Output configuration from TOML (`[output]` section)

use serde::{Deserialize, Serialize};

/// Raw output configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    /// Enable colored terminal output
    pub color: bool,
    /// Show a spinner per persona invocation
    pub show_progress: bool,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            color: true,
            show_progress: true,
        }
    }
}
