//! Personas: named LLM configurations and their versioned registry.

pub mod entities;
pub mod registry;

pub use entities::{FewShotExample, PersonaConfig};
pub use registry::PersonaRegistry;
