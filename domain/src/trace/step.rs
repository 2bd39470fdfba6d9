//! Step records: one per persona invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one persona invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    /// Succeeded on the first attempt
    Ok,
    /// Succeeded after one or more transient failures
    Retried,
    /// Gave up (permanent error, or retries exhausted)
    Failed,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        !matches!(self, StepStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Ok => "OK",
            StepStatus::Retried => "RETRIED",
            StepStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role a persona plays within a strategy's sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaRole {
    /// Drafts and refines the note (first persona of the sequence)
    Editor,
    /// Reviews the current draft and reports feedback with a confidence
    Advisor,
}

impl PersonaRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaRole::Editor => "editor",
            PersonaRole::Advisor => "advisor",
        }
    }
}

/// Audit record of a single persona invocation (append-only)
///
/// `step_number` is assigned by [`RunTrace::push`](super::run::RunTrace::push);
/// the value set before pushing is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_number: u32,
    pub persona_id: String,
    pub persona_version: u32,
    pub role: PersonaRole,
    /// Refinement round this step belongs to (0 = first pass)
    pub round: u32,
    pub input_digest: String,
    /// Persona output; `Null` when the invocation failed
    pub output: Value,
    pub confidence: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub status: StepStatus,
    /// Gateway attempts made, including the successful one
    pub attempts: u32,
    pub tokens_used: u64,
    /// Latency reported by the gateway for the final attempt
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    /// Wall-clock duration of the step, retries and backoff included.
    pub fn duration_ms(&self) -> u64 {
        (self.ended_at - self.started_at).num_milliseconds().max(0) as u64
    }

    /// Output as text: strings verbatim, structured payloads as JSON.
    pub fn output_text(&self) -> String {
        match &self.output {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Turn raw persona text into the step's opaque payload.
///
/// Text that is a JSON object or array is kept structured; anything else is
/// stored as a JSON string.
pub fn output_payload(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return value;
        }
    }
    Value::String(text.to_string())
}
