//! Presentation layer for decisional-middleware
//!
//! This crate contains the CLI definition, the console formatter for
//! finished runs and progress reporters.

pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{Cli, OutputFormat};
pub use output::console::ConsoleFormatter;
pub use progress::reporter::{ProgressReporter, SimpleProgress};
