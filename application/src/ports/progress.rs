//! Progress notification port
//!
//! Defines the interface for reporting progress during an orchestration run.

use crate::ports::llm_gateway::GatewayError;
use middleware_domain::{ComplexityScore, OrchestrationRun, PersonaRole, StepRecord, Strategy};

/// Callback for progress updates during a run
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (console spinner, plain log lines, ...).
pub trait ProgressNotifier: Send + Sync {
    /// Called once the strategy has been selected
    fn on_run_start(&self, run_id: &str, strategy: &Strategy, complexity: &ComplexityScore);

    /// Called before a persona is invoked
    fn on_step_start(&self, step_number: u32, persona_id: &str, role: PersonaRole, round: u32);

    /// Called when a step has been recorded (success or failure)
    fn on_step_complete(&self, step: &StepRecord);

    /// Called when the run reaches a terminal state
    fn on_run_complete(&self, run: &OrchestrationRun);

    /// Called before a transient failure is retried
    fn on_retry(&self, _persona_id: &str, _attempt: u32, _error: &GatewayError) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_run_start(&self, _run_id: &str, _strategy: &Strategy, _complexity: &ComplexityScore) {}
    fn on_step_start(&self, _step_number: u32, _persona_id: &str, _role: PersonaRole, _round: u32) {
    }
    fn on_step_complete(&self, _step: &StepRecord) {}
    fn on_run_complete(&self, _run: &OrchestrationRun) {}
}
