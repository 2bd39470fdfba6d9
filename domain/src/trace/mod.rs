//! Trace domain
//!
//! Audit records of an orchestration run: one [`StepRecord`] per persona
//! invocation, collected by [`RunTrace`] and frozen into an
//! [`OrchestrationRun`].

pub mod report;
pub mod run;
pub mod step;

pub use report::{RunReport, StepReport, StrategyReport};
pub use run::{OrchestrationRun, RunTrace, TerminalState, TerminationReason};
pub use step::{PersonaRole, StepRecord, StepStatus, output_payload};
