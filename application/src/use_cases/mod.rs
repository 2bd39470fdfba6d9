//! Use cases (application services)

pub mod run_orchestration;
pub(crate) mod shared;
