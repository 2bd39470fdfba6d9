//! LLM Gateway port
//!
//! Defines the interface for invoking a persona against an LLM provider.

use async_trait::async_trait;
use middleware_domain::PersonaConfig;
use thiserror::Error;

/// Errors that can occur during LLM gateway operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Timeout")]
    Timeout,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::ConnectionError(_)
                | GatewayError::RateLimited(_)
                | GatewayError::Unavailable(_)
                | GatewayError::Timeout
        )
    }
}

/// Raw result of one persona invocation
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub text: String,
    /// Confidence reported out-of-band by the provider, if any.
    ///
    /// When absent the orchestrator extracts it from `text`.
    pub confidence: Option<f64>,
    pub tokens_used: u64,
    pub latency_ms: u64,
}

impl GatewayResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
            tokens_used: 0,
            latency_ms: 0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_usage(mut self, tokens_used: u64, latency_ms: u64) -> Self {
        self.tokens_used = tokens_used;
        self.latency_ms = latency_ms;
        self
    }
}

/// Gateway for LLM communication
///
/// This port defines how the application layer invokes a persona.
/// Implementations (adapters) live in the infrastructure layer. A single
/// gateway instance is shared by concurrent runs.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Send `input` to the persona's model using the persona's settings.
    async fn invoke(
        &self,
        persona: &PersonaConfig,
        input: &str,
    ) -> Result<GatewayResponse, GatewayError>;
}
