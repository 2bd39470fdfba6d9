//! Gateway configuration from TOML (`[gateway]` section)

use serde::{Deserialize, Serialize};

/// Raw gateway configuration from TOML
///
/// ```toml
/// [gateway]
/// base_url = "http://localhost:11434/v1"
/// api_key_env = "LOCAL_LLM_KEY"
/// request_timeout_secs = 60
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGatewayConfig {
    /// OpenAI-compatible API root (without `/chat/completions`)
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Inline key; takes precedence over `api_key_env`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// HTTP client timeout (strategy call timeouts still apply on top)
    pub request_timeout_secs: u64,
}

impl Default for FileGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            request_timeout_secs: 120,
        }
    }
}

impl FileGatewayConfig {
    /// Inline key if set, otherwise the value of `api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(&self.api_key_env)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }
}
