//! Trace output configuration from TOML (`[trace]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw trace configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTraceConfig {
    /// Append run traces to a JSONL file
    pub enabled: bool,
    /// JSONL file; defaults to `<data dir>/decisional-middleware/traces.jsonl`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for FileTraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl FileTraceConfig {
    /// Where traces go, or `None` when recording is disabled.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        self.path.clone().or_else(|| {
            dirs::data_dir().map(|d| d.join("decisional-middleware").join("traces.jsonl"))
        })
    }
}
