//! Persona definitions from TOML (`[[personas]]` array)

use middleware_domain::{CLINICAL_ADVISOR, MEDICATION_SAFETY_ADVISOR, PersonaConfig, SOAP_EDITOR};

const DEFAULT_MODEL: &str = "gpt-4.1";

/// Personas used by the built-in strategy table.
///
/// A `[[personas]]` array in any config file replaces this list entirely.
pub fn default_personas() -> Vec<PersonaConfig> {
    vec![
        PersonaConfig::new(SOAP_EDITOR, DEFAULT_MODEL)
            .with_temperature(0.2)
            .with_max_tokens(2048)
            .with_system_prompt(
                "Write a SOAP note from the transcript. When given feedback, return the revised note. \
                 End with `confidence: <0..1>`.",
            ),
        PersonaConfig::new(CLINICAL_ADVISOR, DEFAULT_MODEL)
            .with_temperature(0.0)
            .with_max_tokens(1024)
            .with_system_prompt(
                "Review the draft SOAP note against the transcript. Reply with JSON \
                 {\"issues\": [...], \"confidence\": <0..1>}.",
            ),
        PersonaConfig::new(MEDICATION_SAFETY_ADVISOR, DEFAULT_MODEL)
            .with_temperature(0.0)
            .with_max_tokens(1024)
            .with_system_prompt(
                "Check the draft for medication, dosage and interaction problems. Reply with JSON \
                 {\"issues\": [...], \"confidence\": <0..1>}.",
            ),
    ]
}
