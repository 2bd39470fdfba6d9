//! Execution parameters — orchestration loop control.
//!
//! [`ExecutionParams`] groups the parameters that control how
//! [`RunOrchestrationUseCase`](crate::use_cases::run_orchestration::RunOrchestrationUseCase)
//! talks to the gateway. Per-level behavior (rounds, thresholds, call
//! timeouts) lives on the domain [`Strategy`](middleware_domain::Strategy).

use middleware_domain::RetryPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionParams {
    /// Backoff schedule for transient gateway failures.
    pub retry: RetryPolicy,
    /// Confidence assumed when a persona reports none.
    pub missing_confidence: f64,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            missing_confidence: 0.0,
        }
    }
}

impl ExecutionParams {
    // ==================== Builder Methods ====================

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_missing_confidence(mut self, confidence: f64) -> Self {
        self.missing_confidence = confidence.clamp(0.0, 1.0);
        self
    }
}
