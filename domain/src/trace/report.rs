//! External JSON shape of a run.
//!
//! Field names follow the report consumed by downstream clients (`step`,
//! `persona`, `timestamp`, `confidence_score`, ...). [`OrchestrationRun`]
//! converts to and from it losslessly, so an exported report can be fed back
//! in for replay or audit.

use super::run::{OrchestrationRun, TerminalState, TerminationReason};
use super::step::{PersonaRole, StepRecord, StepStatus};
use crate::complexity::score::{ComplexityLevel, ComplexityScore};
use crate::core::error::DomainError;
use crate::strategy::entities::Strategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyReport {
    pub level: ComplexityLevel,
    /// Distinct personas actually invoked
    pub personas_invoked: Vec<String>,
    pub personas_sequence: Vec<String>,
    pub max_rounds: u32,
    pub confidence_threshold: f64,
    pub allow_refinement: bool,
    pub call_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: u32,
    pub persona: String,
    pub persona_version: u32,
    pub role: PersonaRole,
    pub round: u32,
    /// Start of the step
    pub timestamp: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub output: Value,
    pub confidence: f64,
    pub status: StepStatus,
    pub input_digest: String,
    pub attempts: u32,
    pub tokens_used: u64,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub strategy: StrategyReport,
    pub confidence_score: f64,
    pub complexity_score: f64,
    pub complexity_level: ComplexityLevel,
    pub steps: Vec<StepReport>,
    pub doctor_context_requested: bool,
    pub terminal_state: TerminalState,
    pub termination_reason: TerminationReason,
    pub final_output: Option<Value>,
    pub total_duration_ms: u64,
}

impl From<&StepRecord> for StepReport {
    fn from(step: &StepRecord) -> Self {
        Self {
            step: step.step_number,
            persona: step.persona_id.clone(),
            persona_version: step.persona_version,
            role: step.role,
            round: step.round,
            timestamp: step.started_at,
            ended_at: step.ended_at,
            duration_ms: step.duration_ms(),
            output: step.output.clone(),
            confidence: step.confidence,
            status: step.status,
            input_digest: step.input_digest.clone(),
            attempts: step.attempts,
            tokens_used: step.tokens_used,
            latency_ms: step.latency_ms,
            error: step.error.clone(),
        }
    }
}

impl From<StepReport> for StepRecord {
    fn from(report: StepReport) -> Self {
        Self {
            step_number: report.step,
            persona_id: report.persona,
            persona_version: report.persona_version,
            role: report.role,
            round: report.round,
            input_digest: report.input_digest,
            output: report.output,
            confidence: report.confidence,
            started_at: report.timestamp,
            ended_at: report.ended_at,
            status: report.status,
            attempts: report.attempts,
            tokens_used: report.tokens_used,
            latency_ms: report.latency_ms,
            error: report.error,
        }
    }
}

impl OrchestrationRun {
    pub fn to_report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id.clone(),
            started_at: self.started_at,
            strategy: StrategyReport {
                level: self.strategy.level,
                personas_invoked: self.personas_invoked(),
                personas_sequence: self.strategy.personas_sequence.clone(),
                max_rounds: self.strategy.max_rounds,
                confidence_threshold: self.strategy.confidence_threshold,
                allow_refinement: self.strategy.allow_refinement,
                call_timeout_ms: self.strategy.call_timeout_ms,
            },
            confidence_score: self.final_confidence,
            complexity_score: self.complexity.score,
            complexity_level: self.complexity.level,
            steps: self.steps.iter().map(StepReport::from).collect(),
            doctor_context_requested: self.doctor_context_requested,
            terminal_state: self.terminal_state,
            termination_reason: self.termination_reason.clone(),
            final_output: self.final_output.clone(),
            total_duration_ms: self.total_duration_ms,
        }
    }

    /// Rebuild a run from its report.
    ///
    /// Rejects reports whose step numbers are not `1..=n` in order or whose
    /// terminal state contradicts the termination reason.
    pub fn from_report(report: RunReport) -> Result<Self, DomainError> {
        for (index, step) in report.steps.iter().enumerate() {
            let expected = index as u32 + 1;
            if step.step != expected {
                return Err(DomainError::InvalidInput(format!(
                    "report step numbers must be sequential: expected {}, found {}",
                    expected, step.step
                )));
            }
        }
        if report.termination_reason.terminal_state() != report.terminal_state {
            return Err(DomainError::InvalidInput(format!(
                "terminal state {} does not match termination reason '{}'",
                report.terminal_state,
                report.termination_reason.describe()
            )));
        }

        let strategy = Strategy {
            level: report.strategy.level,
            personas_sequence: report.strategy.personas_sequence,
            max_rounds: report.strategy.max_rounds,
            confidence_threshold: report.strategy.confidence_threshold,
            allow_refinement: report.strategy.allow_refinement,
            call_timeout_ms: report.strategy.call_timeout_ms,
        };

        Ok(Self {
            run_id: report.run_id,
            strategy,
            complexity: ComplexityScore {
                score: report.complexity_score,
                level: report.complexity_level,
            },
            started_at: report.started_at,
            steps: report.steps.into_iter().map(StepRecord::from).collect(),
            final_output: report.final_output,
            final_confidence: report.confidence_score,
            terminal_state: report.terminal_state,
            termination_reason: report.termination_reason,
            doctor_context_requested: report.doctor_context_requested,
            total_duration_ms: report.total_duration_ms,
        })
    }
}
