//! Orchestration run aggregate.
//!
//! A run is built in two phases. While persona invocations are in flight the
//! orchestrator appends to a [`RunTrace`], which numbers steps itself so the
//! sequence is gap-free and monotonic. [`RunTrace::finish`] then freezes it
//! into an [`OrchestrationRun`] whose terminal state is derived from the
//! [`TerminationReason`], so the two can never disagree.

use super::step::{PersonaRole, StepRecord};
use crate::complexity::score::ComplexityScore;
use crate::strategy::entities::Strategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalState {
    Converged,
    MaxRoundsReached,
    Failed,
}

impl TerminalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalState::Converged => "CONVERGED",
            TerminalState::MaxRoundsReached => "MAX_ROUNDS_REACHED",
            TerminalState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for TerminalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    /// Evaluated confidence reached the strategy threshold
    ThresholdMet,
    /// The editor produced the same draft twice in a row
    OscillationDetected,
    /// Every allowed refinement round was spent below threshold
    RoundBudgetExhausted,
    /// Below threshold but the strategy cannot refine (disabled, or no advisor)
    RefinementUnavailable,
    /// A persona invocation failed permanently or ran out of retries
    GatewayFailure {
        persona_id: String,
        message: String,
        transient: bool,
    },
    /// The run's cancellation token fired
    Cancelled,
    /// A persona in the strategy could not be resolved from the registry
    Configuration { message: String },
}

impl TerminationReason {
    pub fn terminal_state(&self) -> TerminalState {
        match self {
            TerminationReason::ThresholdMet | TerminationReason::OscillationDetected => {
                TerminalState::Converged
            }
            TerminationReason::RoundBudgetExhausted | TerminationReason::RefinementUnavailable => {
                TerminalState::MaxRoundsReached
            }
            TerminationReason::GatewayFailure { .. }
            | TerminationReason::Cancelled
            | TerminationReason::Configuration { .. } => TerminalState::Failed,
        }
    }

    /// Short human-readable description.
    pub fn describe(&self) -> String {
        match self {
            TerminationReason::ThresholdMet => "confidence threshold met".to_string(),
            TerminationReason::OscillationDetected => {
                "refined draft identical to previous draft".to_string()
            }
            TerminationReason::RoundBudgetExhausted => "refinement rounds exhausted".to_string(),
            TerminationReason::RefinementUnavailable => {
                "below threshold, refinement unavailable".to_string()
            }
            TerminationReason::GatewayFailure {
                persona_id,
                message,
                ..
            } => format!("{} failed: {}", persona_id, message),
            TerminationReason::Cancelled => "cancelled".to_string(),
            TerminationReason::Configuration { message } => {
                format!("configuration error: {}", message)
            }
        }
    }
}

/// In-progress run (append-only step log)
#[derive(Debug, Clone)]
pub struct RunTrace {
    run_id: String,
    strategy: Strategy,
    complexity: ComplexityScore,
    started_at: DateTime<Utc>,
    steps: Vec<StepRecord>,
}

impl RunTrace {
    pub fn new(run_id: impl Into<String>, strategy: Strategy, complexity: ComplexityScore) -> Self {
        Self {
            run_id: run_id.into(),
            strategy,
            complexity,
            started_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn next_step_number(&self) -> u32 {
        self.steps.len() as u32 + 1
    }

    /// Append a step, assigning it the next step number.
    pub fn push(&mut self, mut step: StepRecord) -> &StepRecord {
        step.step_number = self.next_step_number();
        self.steps.push(step);
        &self.steps[self.steps.len() - 1]
    }

    /// Freeze the trace into a terminal run.
    ///
    /// `final_output` is the latest successful editor output, or `None` when
    /// the run failed.
    pub fn finish(
        self,
        reason: TerminationReason,
        final_confidence: f64,
        total_duration_ms: u64,
    ) -> OrchestrationRun {
        let terminal_state = reason.terminal_state();
        let final_output = match terminal_state {
            TerminalState::Failed => None,
            _ => self
                .steps
                .iter()
                .rev()
                .find(|s| s.role == PersonaRole::Editor && s.status.is_success())
                .map(|s| s.output.clone()),
        };
        let doctor_context_requested = reason != TerminationReason::ThresholdMet;

        OrchestrationRun {
            run_id: self.run_id,
            strategy: self.strategy,
            complexity: self.complexity,
            started_at: self.started_at,
            steps: self.steps,
            final_output,
            final_confidence,
            terminal_state,
            termination_reason: reason,
            doctor_context_requested,
            total_duration_ms,
        }
    }
}

/// A completed (terminal) orchestration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationRun {
    pub run_id: String,
    pub strategy: Strategy,
    pub complexity: ComplexityScore,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
    pub final_output: Option<Value>,
    /// Last confidence reported by a successful step (0.0 if none)
    pub final_confidence: f64,
    pub terminal_state: TerminalState,
    pub termination_reason: TerminationReason,
    /// The run stopped without meeting its threshold and needs a clinician
    pub doctor_context_requested: bool,
    pub total_duration_ms: u64,
}

impl OrchestrationRun {
    pub fn is_converged(&self) -> bool {
        self.terminal_state == TerminalState::Converged
    }

    pub fn is_failed(&self) -> bool {
        self.terminal_state == TerminalState::Failed
    }

    /// Distinct personas that were invoked, in first-invocation order.
    pub fn personas_invoked(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for step in &self.steps {
            if !seen.contains(&step.persona_id) {
                seen.push(step.persona_id.clone());
            }
        }
        seen
    }

    /// `(persona_id, persona_version)` pairs used by this run, for replay.
    pub fn persona_pins(&self) -> Vec<(String, u32)> {
        let mut pins: Vec<(String, u32)> = Vec::new();
        for step in &self.steps {
            if !pins.iter().any(|(id, _)| id == &step.persona_id) {
                pins.push((step.persona_id.clone(), step.persona_version));
            }
        }
        pins
    }

    /// Number of refinement rounds actually entered.
    pub fn rounds_used(&self) -> u32 {
        self.steps.iter().map(|s| s.round).max().unwrap_or(0)
    }

    pub fn total_tokens(&self) -> u64 {
        self.steps.iter().map(|s| s.tokens_used).sum()
    }

    pub fn failed_step(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|s| !s.status.is_success())
    }
}
