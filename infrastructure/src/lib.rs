//! Infrastructure layer for decisional-middleware
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, plus configuration file loading.

pub mod config;
pub mod gateway;
pub mod logging;

// Re-export commonly used types
pub use config::{ConfigLoader, FileConfig};
pub use gateway::OpenAiGateway;
pub use logging::{InMemoryTraceRecorder, JsonlTraceRecorder};
