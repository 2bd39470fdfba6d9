//! Domain layer for decisional-middleware
//!
//! Pure business logic for orchestrating clinical-documentation personas.
//! No I/O, no async, no knowledge of concrete LLM providers.
//!
//! # Core Concepts
//!
//! ## Complexity
//!
//! Each case is scored from transcript features (symptoms, medications,
//! vital signs, differentials, ...) into a 0-100 score and a
//! [`ComplexityLevel`].
//!
//! ## Strategy
//!
//! The [`StrategyTable`] maps every level to a [`Strategy`]: which personas
//! run, how many refinement rounds are allowed and the confidence at which
//! the run converges.
//!
//! ## Persona
//!
//! A [`PersonaConfig`] is a versioned LLM configuration. The
//! [`PersonaRegistry`] keeps every version so past runs stay replayable.
//!
//! ## Trace
//!
//! Every persona invocation becomes a [`StepRecord`]; a finished run is an
//! [`OrchestrationRun`] with a [`TerminalState`].

pub mod complexity;
pub mod core;
pub mod orchestration;
pub mod persona;
pub mod strategy;
pub mod trace;

// Re-export commonly used types
pub use complexity::{
    CaseFeatures, ComplexityAnalyzer, ComplexityLevel, ComplexityScore, ComplexityWeights,
    LevelBreakpoints, ScoreContribution, StructuredHints,
};
pub use core::{
    digest::input_digest,
    error::DomainError,
    validation::{ConfigIssue, ConfigIssueCode, Severity, has_errors},
};
pub use orchestration::{
    AdvisorFeedback, CaseInput, Evaluation, OrchestrationState, PersonaInput, RetryPolicy,
    evaluate, parse_confidence,
};
pub use persona::{FewShotExample, PersonaConfig, PersonaRegistry};
pub use strategy::{
    CLINICAL_ADVISOR, DEFAULT_CALL_TIMEOUT_MS, MEDICATION_SAFETY_ADVISOR, SOAP_EDITOR, Strategy,
    StrategyTable,
};
pub use trace::{
    OrchestrationRun, PersonaRole, RunReport, RunTrace, StepRecord, StepReport, StepStatus,
    StrategyReport, TerminalState, TerminationReason, output_payload,
};
