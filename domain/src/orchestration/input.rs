//! Case input and per-invocation persona input composition.
//!
//! The first editor invocation receives the raw transcript. Every later
//! invocation receives a JSON document, so the structure the persona sees is
//! deterministic and its digest is reproducible on replay.

use crate::complexity::features::StructuredHints;
use crate::core::digest::input_digest;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A clinical case submitted for orchestration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseInput {
    pub transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints: Option<StructuredHints>,
}

impl CaseInput {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            hints: None,
        }
    }

    pub fn with_hints(mut self, hints: StructuredHints) -> Self {
        self.hints = Some(hints);
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.transcript.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "transcript must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Feedback one advisor produced on a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorFeedback {
    pub persona_id: String,
    pub confidence: f64,
    pub feedback: Value,
}

/// What a persona is asked to do in one invocation
#[derive(Debug, Clone, PartialEq)]
pub enum PersonaInput {
    /// First editor pass over the raw transcript
    Draft { transcript: String },
    /// Advisor review of the current draft
    Review {
        transcript: String,
        draft: Value,
        round: u32,
    },
    /// Editor refinement of its previous draft using advisor feedback
    Refine {
        transcript: String,
        previous_draft: Value,
        feedback: Vec<AdvisorFeedback>,
        round: u32,
    },
}

impl PersonaInput {
    pub fn task(&self) -> &'static str {
        match self {
            PersonaInput::Draft { .. } => "draft",
            PersonaInput::Review { .. } => "review",
            PersonaInput::Refine { .. } => "refine",
        }
    }

    /// Text handed to the gateway as the user message.
    pub fn render(&self) -> String {
        match self {
            PersonaInput::Draft { transcript } => transcript.clone(),
            PersonaInput::Review {
                transcript,
                draft,
                round,
            } => json!({
                "task": self.task(),
                "round": round,
                "transcript": transcript,
                "draft": draft,
            })
            .to_string(),
            PersonaInput::Refine {
                transcript,
                previous_draft,
                feedback,
                round,
            } => json!({
                "task": self.task(),
                "round": round,
                "transcript": transcript,
                "previous_draft": previous_draft,
                "feedback": feedback,
            })
            .to_string(),
        }
    }

    pub fn digest(&self) -> String {
        input_digest(&self.render())
    }
}
