//! In-process trace recorder.

use middleware_application::{RecorderError, TraceRecorder};
use middleware_domain::{OrchestrationRun, StepRecord};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Recorded {
    steps: HashMap<String, Vec<StepRecord>>,
    runs: Vec<OrchestrationRun>,
}

/// Keeps every step and finished run in memory.
///
/// Useful for embedding the middleware in a host process that forwards
/// traces itself, and for inspecting runs in tests.
#[derive(Debug, Default)]
pub struct InMemoryTraceRecorder {
    recorded: Mutex<Recorded>,
}

impl InMemoryTraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Steps appended so far for `run_id`, in arrival order.
    pub fn steps(&self, run_id: &str) -> Vec<StepRecord> {
        self.lock().steps.get(run_id).cloned().unwrap_or_default()
    }

    /// Finished runs, in completion order.
    pub fn runs(&self) -> Vec<OrchestrationRun> {
        self.lock().runs.clone()
    }

    pub fn run(&self, run_id: &str) -> Option<OrchestrationRun> {
        self.lock().runs.iter().find(|r| r.run_id == run_id).cloned()
    }
}

impl TraceRecorder for InMemoryTraceRecorder {
    fn append(&self, run_id: &str, step: &StepRecord) -> Result<(), RecorderError> {
        let mut recorded = self.lock();
        let steps = recorded.steps.entry(run_id.to_string()).or_default();
        let expected = steps.len() as u32 + 1;
        if step.step_number != expected {
            return Err(RecorderError::InvalidRecord(format!(
                "run {}: expected step {}, got {}",
                run_id, expected, step.step_number
            )));
        }
        steps.push(step.clone());
        Ok(())
    }

    fn finalize(&self, run: &OrchestrationRun) -> Result<(), RecorderError> {
        let mut recorded = self.lock();
        if recorded.runs.iter().any(|r| r.run_id == run.run_id) {
            return Err(RecorderError::InvalidRecord(format!(
                "run {} already finalized",
                run.run_id
            )));
        }
        recorded.runs.push(run.clone());
        Ok(())
    }
}
