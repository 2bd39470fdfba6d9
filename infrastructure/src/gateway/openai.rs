//! OpenAI-compatible chat-completions gateway.
//!
//! Works against any endpoint speaking the `/chat/completions` dialect
//! (OpenAI, Azure-style proxies, local vLLM or Ollama servers). Each persona
//! call is one non-streaming request:
//!
//! ```text
//! system:    persona.system_prompt
//! user:      example[0].input      ┐
//! assistant: example[0].output     ┘ one pair per few-shot example
//! user:      <persona input>
//! ```

use async_trait::async_trait;
use middleware_application::{GatewayError, GatewayResponse, LlmGateway};
use middleware_domain::PersonaConfig;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tracing::debug;

/// OpenAI-compatible [`LlmGateway`] adapter
pub struct OpenAiGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiGateway {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Request body for one persona invocation.
pub(crate) fn build_request_body(persona: &PersonaConfig, input: &str) -> Value {
    let mut messages = Vec::with_capacity(persona.examples.len() * 2 + 2);
    if !persona.system_prompt.is_empty() {
        messages.push(json!({"role": "system", "content": persona.system_prompt}));
    }
    for example in &persona.examples {
        messages.push(json!({"role": "user", "content": example.input}));
        messages.push(json!({"role": "assistant", "content": example.output}));
    }
    messages.push(json!({"role": "user", "content": input}));

    json!({
        "model": persona.model,
        "max_tokens": persona.max_tokens,
        "temperature": persona.temperature,
        "messages": messages,
    })
}

/// Map a non-success HTTP status onto a gateway error.
///
/// Throttling, request timeouts and server-side failures are transient;
/// everything else means the same request will fail again.
pub(crate) fn parse_http_error(status: u16, body: &str) -> GatewayError {
    let detail = format!("HTTP {}: {}", status, body.trim());
    match status {
        401 | 403 => GatewayError::AuthenticationFailed(detail),
        404 => GatewayError::ModelNotAvailable(detail),
        408 | 429 => GatewayError::RateLimited(detail),
        500..=599 => GatewayError::Unavailable(detail),
        _ => GatewayError::InvalidRequest(detail),
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::ConnectionError(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

pub(crate) fn parse_completion(body: &str) -> Result<(String, u64), GatewayError> {
    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| GatewayError::MalformedResponse(format!("Failed to parse response: {}", e)))?;
    let text = completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| GatewayError::MalformedResponse("response has no content".to_string()))?;
    let tokens = completion.usage.map(|u| u.total_tokens).unwrap_or(0);
    Ok((text, tokens))
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    async fn invoke(
        &self,
        persona: &PersonaConfig,
        input: &str,
    ) -> Result<GatewayResponse, GatewayError> {
        let body = build_request_body(persona, input);
        let started = Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(transport_error)?;
        let latency_ms = started.elapsed().as_millis() as u64;

        if !(200..300).contains(&status) {
            return Err(parse_http_error(status, &body_text));
        }

        let (text, tokens_used) = parse_completion(&body_text)?;
        debug!(
            persona = %persona.id,
            model = %persona.model,
            tokens_used,
            latency_ms,
            "Chat completion received"
        );
        Ok(GatewayResponse::new(text).with_usage(tokens_used, latency_ms))
    }
}
