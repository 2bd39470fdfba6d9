//! Orchestration state machine.
//!
//! ```text
//! SelectingStrategy -> InvokingPersona -> EvaluatingConfidence
//!                           ^   |                 |
//!                           |   +-> Failed        +-> Converged
//!                           |                     +-> MaxRoundsReached
//!                        Refining <---------------+
//! ```
//!
//! `InvokingPersona` may loop on itself while a pass walks the persona
//! sequence. Any non-terminal state may move to `Failed`.

use crate::core::error::DomainError;
use crate::trace::run::TerminalState;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestrationState {
    SelectingStrategy,
    InvokingPersona,
    EvaluatingConfidence,
    Refining,
    Converged,
    MaxRoundsReached,
    Failed,
}

impl OrchestrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestrationState::SelectingStrategy => "SELECTING_STRATEGY",
            OrchestrationState::InvokingPersona => "INVOKING_PERSONA",
            OrchestrationState::EvaluatingConfidence => "EVALUATING_CONFIDENCE",
            OrchestrationState::Refining => "REFINING",
            OrchestrationState::Converged => "CONVERGED",
            OrchestrationState::MaxRoundsReached => "MAX_ROUNDS_REACHED",
            OrchestrationState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestrationState::Converged
                | OrchestrationState::MaxRoundsReached
                | OrchestrationState::Failed
        )
    }

    pub fn can_transition_to(&self, next: OrchestrationState) -> bool {
        use OrchestrationState::*;
        match (self, next) {
            (s, Failed) => !s.is_terminal(),
            (SelectingStrategy, InvokingPersona) => true,
            (InvokingPersona, InvokingPersona | EvaluatingConfidence) => true,
            (EvaluatingConfidence, Converged | MaxRoundsReached | Refining) => true,
            (Refining, InvokingPersona) => true,
            _ => false,
        }
    }

    /// Move to `next`, or fail with [`DomainError::IllegalTransition`].
    pub fn transition(self, next: OrchestrationState) -> Result<OrchestrationState, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::IllegalTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl From<TerminalState> for OrchestrationState {
    fn from(state: TerminalState) -> Self {
        match state {
            TerminalState::Converged => OrchestrationState::Converged,
            TerminalState::MaxRoundsReached => OrchestrationState::MaxRoundsReached,
            TerminalState::Failed => OrchestrationState::Failed,
        }
    }
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
