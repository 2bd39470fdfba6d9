//! Port definitions (interfaces for external systems)

pub mod llm_gateway;
pub mod progress;
pub mod trace_recorder;
