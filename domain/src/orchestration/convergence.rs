//! Convergence decision after a confidence evaluation.

use crate::strategy::entities::Strategy;
use crate::trace::run::TerminationReason;

/// Outcome of evaluating one confidence against a strategy
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Stop with this reason
    Finish(TerminationReason),
    /// Enter refinement round `round` (1-based)
    Refine { round: u32 },
}

/// Decide what follows an evaluation.
///
/// `rounds_completed` is the number of refinement rounds already run (0 after
/// the first pass). `draft_repeated` is true when the editor's latest draft
/// is identical to its previous one; a repeated draft stops the loop since a
/// further round would see the same input again.
pub fn evaluate(
    strategy: &Strategy,
    confidence: f64,
    rounds_completed: u32,
    draft_repeated: bool,
) -> Evaluation {
    if confidence >= strategy.confidence_threshold {
        return Evaluation::Finish(TerminationReason::ThresholdMet);
    }
    if draft_repeated {
        return Evaluation::Finish(TerminationReason::OscillationDetected);
    }
    if !strategy.refinement_enabled() {
        return Evaluation::Finish(TerminationReason::RefinementUnavailable);
    }
    if rounds_completed >= strategy.max_rounds {
        return Evaluation::Finish(TerminationReason::RoundBudgetExhausted);
    }
    Evaluation::Refine {
        round: rounds_completed + 1,
    }
}
