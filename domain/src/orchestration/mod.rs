//! Orchestration domain
//!
//! Pure pieces of the orchestration loop: the state machine, persona input
//! composition, confidence extraction, the retry schedule and the
//! convergence decision. The loop itself lives in the application layer.

pub mod confidence;
pub mod convergence;
pub mod input;
pub mod retry;
pub mod state;

pub use confidence::parse_confidence;
pub use convergence::{Evaluation, evaluate};
pub use input::{AdvisorFeedback, CaseInput, PersonaInput};
pub use retry::RetryPolicy;
pub use state::OrchestrationState;
