//! Port for persisting run traces.
//!
//! Every step is handed to the recorder as soon as it is appended to the
//! run, and the frozen run once more when it terminates. Recorders are
//! append-only: nothing already written is rewritten.
//!
//! This is separate from `tracing`-based operation logs: tracing carries
//! diagnostic messages, the recorder carries the audit trail.

use middleware_domain::{OrchestrationRun, StepRecord};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid trace record: {0}")]
    InvalidRecord(String),
}

/// Sink for step records and finished runs.
///
/// Failures are reported to the caller, which logs them; a recorder error
/// never changes the outcome of a run.
pub trait TraceRecorder: Send + Sync {
    /// Record one step of a run in progress.
    fn append(&self, run_id: &str, step: &StepRecord) -> Result<(), RecorderError>;

    /// Record a terminal run.
    fn finalize(&self, run: &OrchestrationRun) -> Result<(), RecorderError>;
}

/// No-op implementation for tests and when recording is disabled.
pub struct NoTraceRecorder;

impl TraceRecorder for NoTraceRecorder {
    fn append(&self, _run_id: &str, _step: &StepRecord) -> Result<(), RecorderError> {
        Ok(())
    }

    fn finalize(&self, _run: &OrchestrationRun) -> Result<(), RecorderError> {
        Ok(())
    }
}
