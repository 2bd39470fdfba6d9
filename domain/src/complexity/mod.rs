//! Case complexity classification.
//!
//! - [`features`] — [`CaseFeatures`](features::CaseFeatures) extraction from transcripts
//! - [`score`] — [`ComplexityLevel`](score::ComplexityLevel) and [`ComplexityScore`](score::ComplexityScore)
//! - [`analyzer`] — the weighted [`ComplexityAnalyzer`](analyzer::ComplexityAnalyzer)

pub mod analyzer;
pub mod features;
pub mod score;

pub use analyzer::{ComplexityAnalyzer, ComplexityWeights, ScoreContribution};
pub use features::{CaseFeatures, StructuredHints};
pub use score::{ComplexityLevel, ComplexityScore, LevelBreakpoints};
