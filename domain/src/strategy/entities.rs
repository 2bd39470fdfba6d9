//! Orchestration strategy entity.

use crate::complexity::score::ComplexityLevel;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Default per-call gateway timeout.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;

fn default_call_timeout_ms() -> u64 {
    DEFAULT_CALL_TIMEOUT_MS
}

/// The fixed plan associated with one complexity level.
///
/// The first persona of `personas_sequence` is the editor (it drafts and
/// refines the note); every following persona is an advisor that reviews the
/// current draft and produces feedback plus a confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub level: ComplexityLevel,
    pub personas_sequence: Vec<String>,
    /// Hard ceiling on refinement rounds across the whole run
    pub max_rounds: u32,
    /// Confidence (0..=1) at or above which the run converges
    pub confidence_threshold: f64,
    pub allow_refinement: bool,
    /// Per gateway call timeout
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Strategy {
    pub fn new(level: ComplexityLevel, personas_sequence: Vec<String>) -> Self {
        Self {
            level,
            personas_sequence,
            max_rounds: 0,
            confidence_threshold: 0.8,
            allow_refinement: false,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_refinement(mut self, allow: bool) -> Self {
        self.allow_refinement = allow;
        self
    }

    pub fn with_call_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.call_timeout_ms = timeout_ms;
        self
    }

    /// The drafting persona.
    pub fn editor(&self) -> Option<&str> {
        self.personas_sequence.first().map(String::as_str)
    }

    /// Reviewing personas, in invocation order.
    pub fn advisors(&self) -> &[String] {
        self.personas_sequence.get(1..).unwrap_or_default()
    }

    pub fn has_advisors(&self) -> bool {
        self.personas_sequence.len() > 1
    }

    /// Whether this strategy can ever enter a refinement round.
    ///
    /// A single-persona sequence never refines, whatever `allow_refinement`
    /// says, because there is no advisor to produce feedback.
    pub fn refinement_enabled(&self) -> bool {
        self.allow_refinement && self.has_advisors() && self.max_rounds > 0
    }

    /// Number of persona invocations a run performs when it never converges.
    ///
    /// The first pass invokes the whole sequence. Round 1 re-invokes the
    /// editor with the first pass's feedback; every later round has the
    /// advisors review the refined draft again before the editor refines it.
    pub fn step_budget(&self) -> usize {
        let n = self.personas_sequence.len();
        if !self.refinement_enabled() {
            return n;
        }
        let rounds = self.max_rounds as usize;
        n + rounds + (rounds - 1) * (n - 1)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.personas_sequence.is_empty() {
            return Err(DomainError::Configuration(format!(
                "strategy {} has an empty persona sequence",
                self.level
            )));
        }
        if self.personas_sequence.iter().any(|id| id.trim().is_empty()) {
            return Err(DomainError::Configuration(format!(
                "strategy {} contains an empty persona id",
                self.level
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DomainError::Configuration(format!(
                "strategy {} confidence_threshold must be within 0..=1 (got {})",
                self.level, self.confidence_threshold
            )));
        }
        if self.call_timeout_ms == 0 {
            return Err(DomainError::Configuration(format!(
                "strategy {} call_timeout_ms must be positive",
                self.level
            )));
        }
        Ok(())
    }
}
