//! Complexity score and level value objects.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discrete complexity classification of a case (Value Object)
///
/// Ordered from least to most orchestration effort, so levels compare with
/// `<` / `>` the way one would expect (`Simple < Critical`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplexityLevel {
    Simple,
    Moderate,
    Complex,
    Critical,
}

impl ComplexityLevel {
    /// Every level, in ascending order.
    pub const ALL: [ComplexityLevel; 4] = [
        ComplexityLevel::Simple,
        ComplexityLevel::Moderate,
        ComplexityLevel::Complex,
        ComplexityLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLevel::Simple => "SIMPLE",
            ComplexityLevel::Moderate => "MODERATE",
            ComplexityLevel::Complex => "COMPLEX",
            ComplexityLevel::Critical => "CRITICAL",
        }
    }

    /// Lowercase key used for configuration sections (`[strategies.simple]`).
    pub fn config_key(&self) -> &'static str {
        match self {
            ComplexityLevel::Simple => "simple",
            ComplexityLevel::Moderate => "moderate",
            ComplexityLevel::Complex => "complex",
            ComplexityLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ComplexityLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(ComplexityLevel::Simple),
            "moderate" => Ok(ComplexityLevel::Moderate),
            "complex" => Ok(ComplexityLevel::Complex),
            "critical" => Ok(ComplexityLevel::Critical),
            other => Err(DomainError::Configuration(format!(
                "unknown complexity level '{}'",
                other
            ))),
        }
    }
}

/// Score breakpoints separating the four levels.
///
/// A score below `moderate` is SIMPLE, below `complex` is MODERATE, below
/// `critical` is COMPLEX, anything else is CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelBreakpoints {
    pub moderate: f64,
    pub complex: f64,
    pub critical: f64,
}

impl Default for LevelBreakpoints {
    fn default() -> Self {
        Self {
            moderate: 25.0,
            complex: 50.0,
            critical: 75.0,
        }
    }
}

impl LevelBreakpoints {
    /// Classify a score.
    pub fn level_for(&self, score: f64) -> ComplexityLevel {
        if score < self.moderate {
            ComplexityLevel::Simple
        } else if score < self.complex {
            ComplexityLevel::Moderate
        } else if score < self.critical {
            ComplexityLevel::Complex
        } else {
            ComplexityLevel::Critical
        }
    }

    /// Breakpoints must be strictly increasing inside `(0, 100]`.
    pub fn validate(&self) -> Result<(), DomainError> {
        let ordered = 0.0 < self.moderate
            && self.moderate < self.complex
            && self.complex < self.critical
            && self.critical <= 100.0;
        if ordered {
            Ok(())
        } else {
            Err(DomainError::Configuration(format!(
                "complexity breakpoints must satisfy 0 < moderate < complex < critical <= 100 (got {} / {} / {})",
                self.moderate, self.complex, self.critical
            )))
        }
    }
}

/// Numeric complexity with its derived level (Value Object)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityScore {
    /// Weighted score clamped to `0..=100`
    pub score: f64,
    pub level: ComplexityLevel,
}

impl ComplexityScore {
    /// Build a score, clamping into range and classifying with `breakpoints`.
    pub fn new(raw: f64, breakpoints: &LevelBreakpoints) -> Self {
        let score = if raw.is_finite() {
            raw.clamp(0.0, 100.0)
        } else {
            100.0
        };
        Self {
            score,
            level: breakpoints.level_for(score),
        }
    }
}
