//! Application layer for decisional-middleware
//!
//! This crate contains the orchestration use case, port definitions, and
//! application configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::ExecutionParams;
pub use ports::{
    llm_gateway::{GatewayError, GatewayResponse, LlmGateway},
    progress::{NoProgress, ProgressNotifier},
    trace_recorder::{NoTraceRecorder, RecorderError, TraceRecorder},
};
pub use use_cases::run_orchestration::{RunOrchestrationError, RunOrchestrationUseCase};
