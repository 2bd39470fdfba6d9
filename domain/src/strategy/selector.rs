//! Strategy Selector
//!
//! [`StrategyTable`] is the total mapping from [`ComplexityLevel`] to
//! [`Strategy`]. It can only be constructed when every level is covered, so
//! a missing mapping surfaces when configuration is loaded at startup and
//! `select` never fails at request time.

use super::entities::Strategy;
use crate::complexity::score::ComplexityLevel;
use crate::core::error::DomainError;
use std::collections::BTreeSet;

/// Persona id of the drafting persona in the built-in strategies.
pub const SOAP_EDITOR: &str = "soap_editor";
/// Persona id of the clinical-accuracy reviewer in the built-in strategies.
pub const CLINICAL_ADVISOR: &str = "clinical_advisor";
/// Persona id of the medication-safety reviewer used for critical cases.
pub const MEDICATION_SAFETY_ADVISOR: &str = "medication_safety_advisor";

/// One strategy per complexity level (immutable once built)
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyTable {
    simple: Strategy,
    moderate: Strategy,
    complex: Strategy,
    critical: Strategy,
}

impl StrategyTable {
    /// Build the table, requiring exactly one valid strategy per level.
    pub fn from_strategies(
        strategies: impl IntoIterator<Item = Strategy>,
    ) -> Result<Self, DomainError> {
        let mut simple = None;
        let mut moderate = None;
        let mut complex = None;
        let mut critical = None;

        for strategy in strategies {
            strategy.validate()?;
            let slot = match strategy.level {
                ComplexityLevel::Simple => &mut simple,
                ComplexityLevel::Moderate => &mut moderate,
                ComplexityLevel::Complex => &mut complex,
                ComplexityLevel::Critical => &mut critical,
            };
            if slot.is_some() {
                return Err(DomainError::Configuration(format!(
                    "more than one strategy configured for level {}",
                    strategy.level
                )));
            }
            *slot = Some(strategy);
        }

        Ok(Self {
            simple: simple.ok_or(DomainError::MissingStrategy(ComplexityLevel::Simple))?,
            moderate: moderate.ok_or(DomainError::MissingStrategy(ComplexityLevel::Moderate))?,
            complex: complex.ok_or(DomainError::MissingStrategy(ComplexityLevel::Complex))?,
            critical: critical.ok_or(DomainError::MissingStrategy(ComplexityLevel::Critical))?,
        })
    }

    /// Select the strategy for a level.
    pub fn select(&self, level: ComplexityLevel) -> &Strategy {
        match level {
            ComplexityLevel::Simple => &self.simple,
            ComplexityLevel::Moderate => &self.moderate,
            ComplexityLevel::Complex => &self.complex,
            ComplexityLevel::Critical => &self.critical,
        }
    }

    /// All strategies in ascending level order.
    pub fn iter(&self) -> impl Iterator<Item = &Strategy> {
        ComplexityLevel::ALL.into_iter().map(|level| self.select(level))
    }

    /// Every persona id referenced by any strategy.
    pub fn persona_ids(&self) -> BTreeSet<&str> {
        self.iter()
            .flat_map(|s| s.personas_sequence.iter().map(String::as_str))
            .collect()
    }
}

impl Default for StrategyTable {
    fn default() -> Self {
        let editor_only = vec![SOAP_EDITOR.to_string()];
        let pair = vec![SOAP_EDITOR.to_string(), CLINICAL_ADVISOR.to_string()];
        let full = vec![
            SOAP_EDITOR.to_string(),
            CLINICAL_ADVISOR.to_string(),
            MEDICATION_SAFETY_ADVISOR.to_string(),
        ];

        Self {
            simple: Strategy::new(ComplexityLevel::Simple, editor_only).with_threshold(0.70),
            moderate: Strategy::new(ComplexityLevel::Moderate, pair.clone())
                .with_max_rounds(1)
                .with_threshold(0.85)
                .with_refinement(true),
            complex: Strategy::new(ComplexityLevel::Complex, pair)
                .with_max_rounds(2)
                .with_threshold(0.90)
                .with_refinement(true)
                .with_call_timeout_ms(45_000),
            critical: Strategy::new(ComplexityLevel::Critical, full)
                .with_max_rounds(3)
                .with_threshold(0.95)
                .with_refinement(true)
                .with_call_timeout_ms(60_000),
        }
    }
}
