//! Application-level configuration.
//!
//! - [`ExecutionParams`] — retry schedule and confidence fallback

pub mod execution_params;

pub use execution_params::ExecutionParams;
