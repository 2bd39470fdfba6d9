//! Complexity Analyzer
//!
//! Maps [`CaseFeatures`] to a [`ComplexityScore`] through a weighted sum.
//! Weights and level breakpoints are configuration; the analyzer itself is a
//! pure function of its inputs so past classifications can be reproduced
//! exactly during an audit.

use super::features::{CaseFeatures, StructuredHints};
use super::score::{ComplexityScore, LevelBreakpoints};
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Weights of the complexity formula.
///
/// ```text
/// score = min(chars / 1000 * per_thousand_chars, length_cap)
///       + symptoms * per_symptom + medications * per_medication
///       + readings * per_vital_reading + anomalies * per_vital_anomaly
///       + differentials * per_differential
///       + ambiguity? + pediatric? + emergency?
/// ```
///
/// The result is clamped to `0..=100`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityWeights {
    pub per_thousand_chars: f64,
    pub length_cap: f64,
    pub per_symptom: f64,
    pub per_medication: f64,
    pub per_vital_reading: f64,
    pub per_vital_anomaly: f64,
    pub per_differential: f64,
    pub ambiguity: f64,
    pub pediatric: f64,
    pub emergency: f64,
}

impl Default for ComplexityWeights {
    fn default() -> Self {
        Self {
            per_thousand_chars: 4.0,
            length_cap: 12.0,
            per_symptom: 4.0,
            per_medication: 3.0,
            per_vital_reading: 1.0,
            per_vital_anomaly: 6.0,
            per_differential: 5.0,
            ambiguity: 8.0,
            pediatric: 10.0,
            emergency: 25.0,
        }
    }
}

impl ComplexityWeights {
    fn named(&self) -> [(&'static str, f64); 10] {
        [
            ("per_thousand_chars", self.per_thousand_chars),
            ("length_cap", self.length_cap),
            ("per_symptom", self.per_symptom),
            ("per_medication", self.per_medication),
            ("per_vital_reading", self.per_vital_reading),
            ("per_vital_anomaly", self.per_vital_anomaly),
            ("per_differential", self.per_differential),
            ("ambiguity", self.ambiguity),
            ("pediatric", self.pediatric),
            ("emergency", self.emergency),
        ]
    }

    /// All weights must be finite and non-negative.
    pub fn validate(&self) -> Result<(), DomainError> {
        for (name, value) in self.named() {
            if !value.is_finite() || value < 0.0 {
                return Err(DomainError::Configuration(format!(
                    "complexity weight '{}' must be a non-negative number (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// One term of the weighted sum, for audit/debug output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreContribution {
    pub feature: &'static str,
    pub points: f64,
}

/// Complexity Analyzer (Domain Service)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityAnalyzer {
    #[serde(default)]
    pub weights: ComplexityWeights,
    #[serde(default)]
    pub breakpoints: LevelBreakpoints,
}

impl ComplexityAnalyzer {
    pub fn new(weights: ComplexityWeights, breakpoints: LevelBreakpoints) -> Self {
        Self {
            weights,
            breakpoints,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.weights.validate()?;
        self.breakpoints.validate()
    }

    /// Extract features from the transcript and score them.
    pub fn analyze(
        &self,
        transcript: &str,
        hints: Option<&StructuredHints>,
    ) -> Result<ComplexityScore, DomainError> {
        let features = CaseFeatures::extract(transcript, hints)?;
        Ok(self.score(&features))
    }

    /// Score already-extracted features.
    pub fn score(&self, features: &CaseFeatures) -> ComplexityScore {
        let raw: f64 = self.contributions(features).iter().map(|c| c.points).sum();
        ComplexityScore::new(raw, &self.breakpoints)
    }

    /// Break the raw (unclamped) score down per feature.
    pub fn contributions(&self, features: &CaseFeatures) -> Vec<ScoreContribution> {
        let w = &self.weights;
        let flag = |set: bool, weight: f64| if set { weight } else { 0.0 };
        let length_points =
            (features.transcript_chars as f64 / 1000.0 * w.per_thousand_chars).min(w.length_cap);

        vec![
            ScoreContribution {
                feature: "length",
                points: length_points,
            },
            ScoreContribution {
                feature: "symptoms",
                points: features.symptom_count as f64 * w.per_symptom,
            },
            ScoreContribution {
                feature: "medications",
                points: features.medication_count as f64 * w.per_medication,
            },
            ScoreContribution {
                feature: "vital_readings",
                points: features.vital_sign_count as f64 * w.per_vital_reading,
            },
            ScoreContribution {
                feature: "vital_anomalies",
                points: features.vital_anomaly_count as f64 * w.per_vital_anomaly,
            },
            ScoreContribution {
                feature: "differentials",
                points: features.differential_count as f64 * w.per_differential,
            },
            ScoreContribution {
                feature: "ambiguity",
                points: flag(features.ambiguous, w.ambiguity),
            },
            ScoreContribution {
                feature: "pediatric",
                points: flag(features.pediatric, w.pediatric),
            },
            ScoreContribution {
                feature: "emergency",
                points: flag(features.emergency, w.emergency),
            },
        ]
    }
}
