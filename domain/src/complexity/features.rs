//! Case feature extraction.
//!
//! [`CaseFeatures`] is the immutable snapshot that complexity scoring works
//! from. Features come from fixed text heuristics over the transcript; any
//! count already extracted upstream (e.g. by diarization) arrives as a
//! [`StructuredHints`] value and takes precedence over the heuristic.

use crate::core::error::DomainError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static SYMPTOM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(shortness of breath|chest pain|abdominal pain|back pain|sore throat|runny nose|weight loss|night sweats|pain|fever|cough|nausea|vomiting|diarrh(?:o)?ea|constipation|headache|dizziness|fatigue|rash|swelling|palpitations|wheez(?:e|ing)|chills|insomnia|numbness|weakness|syncope|dyspnea|itching|bleeding|confusion)\b",
    )
    .expect("symptom pattern is valid")
});

static MEDICATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(aspirin|ibuprofen|paracetamol|acetaminophen|insulin|warfarin|heparin|prednisone|morphine|[a-z]+(?:pril|olol|sartan|statin|cillin|mycin|prazole|formin|dipine|azepam|oxetine|triptan|tidine))\b",
    )
    .expect("medication pattern is valid")
});

static BLOOD_PRESSURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:bp|blood pressure)\s*(?:[:=]|is|was|of)?\s*(\d{2,3})\s*/\s*(\d{2,3})")
        .expect("blood pressure pattern is valid")
});

static HEART_RATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:hr|heart rate|pulse)\s*(?:[:=]|is|was|of)?\s*(\d{2,3})\b")
        .expect("heart rate pattern is valid")
});

static TEMPERATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:temp|temperature)\s*(?:[:=]|is|was|of)?\s*(\d{2,3}(?:\.\d+)?)")
        .expect("temperature pattern is valid")
});

static OXYGEN_SATURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:spo2|o2 sat(?:uration)?|oxygen saturation|sats?)\s*(?:[:=]|is|was|of)?\s*(\d{2,3})",
    )
    .expect("oxygen saturation pattern is valid")
});

static RESPIRATORY_RATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:rr|resp(?:iratory)? rate)\s*(?:[:=]|is|was|of)?\s*(\d{1,2})\b")
        .expect("respiratory rate pattern is valid")
});

static DIFFERENTIAL_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:rule out|r/o|differential|versus|vs)\b")
        .expect("differential pattern is valid")
});

static AMBIGUITY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:unclear|uncertain|possibly|maybe|not sure|might be|could be|equivocal|vague|unsure|questionable)\b",
    )
    .expect("ambiguity pattern is valid")
});

static PEDIATRIC_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:child|children|infant|toddler|newborn|neonate|pediatric|paediatric|baby|\d{1,2}\s*-?\s*(?:months?|weeks?|days?)\s*-?\s*old)\b",
    )
    .expect("pediatric pattern is valid")
});

static STATED_AGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3})\s*-?\s*(?:years?|yrs?)\s*-?\s*old\b|\b(\d{1,3})\s*(?:y/o|yo)\b")
        .expect("age pattern is valid")
});

static EMERGENCY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:chest pain|unresponsive|unconscious|stroke|seizures?|anaphyla(?:xis|ctic)|cardiac arrest|severe bleeding|haemorrhage|hemorrhage|suicidal|sepsis|respiratory distress)\b",
    )
    .expect("emergency pattern is valid")
});

/// Ages strictly below this are treated as pediatric.
const PEDIATRIC_AGE_LIMIT: u32 = 16;

/// Counts and flags already extracted upstream.
///
/// Every field is optional; a present field overrides the value the text
/// heuristics would produce. Deserializes from a plain JSON/TOML map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredHints {
    pub symptom_count: Option<u32>,
    pub medication_count: Option<u32>,
    pub vital_sign_count: Option<u32>,
    pub vital_anomaly_count: Option<u32>,
    pub differential_count: Option<u32>,
    pub ambiguous: Option<bool>,
    pub pediatric: Option<bool>,
    pub emergency: Option<bool>,
}

/// Immutable snapshot of the inputs to complexity scoring (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFeatures {
    /// Transcript length in characters (not bytes)
    pub transcript_chars: usize,
    /// Distinguishable symptoms mentioned
    pub symptom_count: u32,
    /// Distinct medications mentioned
    pub medication_count: u32,
    /// Vital-sign readings found
    pub vital_sign_count: u32,
    /// Readings outside the normal adult range
    pub vital_anomaly_count: u32,
    /// Differential-diagnosis markers ("rule out", "versus", ...)
    pub differential_count: u32,
    pub ambiguous: bool,
    pub pediatric: bool,
    pub emergency: bool,
}

impl CaseFeatures {
    /// Extract features from a transcript, applying any upstream hints.
    ///
    /// Fails with [`DomainError::InvalidInput`] for an empty or
    /// whitespace-only transcript.
    pub fn extract(
        transcript: &str,
        hints: Option<&StructuredHints>,
    ) -> Result<Self, DomainError> {
        if transcript.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "transcript must not be empty".to_string(),
            ));
        }

        let vitals = scan_vitals(transcript);
        let defaults = StructuredHints::default();
        let hints = hints.unwrap_or(&defaults);

        Ok(Self {
            transcript_chars: transcript.chars().count(),
            symptom_count: hints
                .symptom_count
                .unwrap_or_else(|| distinct_matches(&SYMPTOM_PATTERN, transcript)),
            medication_count: hints
                .medication_count
                .unwrap_or_else(|| distinct_matches(&MEDICATION_PATTERN, transcript)),
            vital_sign_count: hints.vital_sign_count.unwrap_or(vitals.readings),
            vital_anomaly_count: hints.vital_anomaly_count.unwrap_or(vitals.anomalies),
            differential_count: hints
                .differential_count
                .unwrap_or_else(|| DIFFERENTIAL_MARKER.find_iter(transcript).count() as u32),
            ambiguous: hints
                .ambiguous
                .unwrap_or_else(|| AMBIGUITY_MARKER.is_match(transcript)),
            pediatric: hints
                .pediatric
                .unwrap_or_else(|| is_pediatric(transcript)),
            emergency: hints
                .emergency
                .unwrap_or_else(|| EMERGENCY_MARKER.is_match(transcript)),
        })
    }
}

fn distinct_matches(pattern: &Regex, text: &str) -> u32 {
    pattern
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect::<BTreeSet<_>>()
        .len() as u32
}

fn is_pediatric(text: &str) -> bool {
    if PEDIATRIC_MARKER.is_match(text) {
        return true;
    }
    STATED_AGE.captures_iter(text).any(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .is_some_and(|age| age < PEDIATRIC_AGE_LIMIT)
    })
}

#[derive(Debug, Default, PartialEq, Eq)]
struct VitalScan {
    readings: u32,
    anomalies: u32,
}

impl VitalScan {
    fn record(&mut self, abnormal: bool) {
        self.readings += 1;
        if abnormal {
            self.anomalies += 1;
        }
    }
}

fn capture_f64(caps: &regex::Captures<'_>, group: usize) -> Option<f64> {
    caps.get(group).and_then(|m| m.as_str().parse::<f64>().ok())
}

fn scan_vitals(text: &str) -> VitalScan {
    let mut scan = VitalScan::default();

    for caps in BLOOD_PRESSURE.captures_iter(text) {
        if let (Some(systolic), Some(diastolic)) = (capture_f64(&caps, 1), capture_f64(&caps, 2)) {
            scan.record(systolic >= 160.0 || systolic <= 90.0 || diastolic >= 100.0);
        }
    }
    for caps in HEART_RATE.captures_iter(text) {
        if let Some(rate) = capture_f64(&caps, 1) {
            scan.record(!(50.0..=120.0).contains(&rate));
        }
    }
    for caps in TEMPERATURE.captures_iter(text) {
        if let Some(temp) = capture_f64(&caps, 1) {
            // Readings above 45 can only be Fahrenheit
            let abnormal = if temp > 45.0 {
                temp >= 101.3 || temp <= 95.0
            } else {
                temp >= 38.5 || temp <= 35.0
            };
            scan.record(abnormal);
        }
    }
    for caps in OXYGEN_SATURATION.captures_iter(text) {
        if let Some(sat) = capture_f64(&caps, 1) {
            scan.record(sat < 92.0);
        }
    }
    for caps in RESPIRATORY_RATE.captures_iter(text) {
        if let Some(rate) = capture_f64(&caps, 1) {
            scan.record(!(10.0..=24.0).contains(&rate));
        }
    }

    scan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_transcript_rejected() {
        assert!(matches!(
            CaseFeatures::extract("", None),
            Err(DomainError::InvalidInput(_))
        ));
        assert!(matches!(
            CaseFeatures::extract("   \n\t ", None),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_symptoms_counted_distinctly() {
        let features =
            CaseFeatures::extract("Cough for a week. The cough is dry. Also fever and FEVER.", None)
                .unwrap();
        assert_eq!(features.symptom_count, 2);
    }

    #[test]
    fn test_multi_word_symptom_is_one_symptom() {
        let features = CaseFeatures::extract("Reports shortness of breath on exertion.", None).unwrap();
        assert_eq!(features.symptom_count, 1);
    }

    #[test]
    fn test_medications_by_name_and_suffix() {
        let features = CaseFeatures::extract(
            "Takes lisinopril 10mg, metoprolol, atorvastatin and aspirin. Lisinopril was increased.",
            None,
        )
        .unwrap();
        assert_eq!(features.medication_count, 4);
    }

    #[test]
    fn test_vital_readings_and_anomalies() {
        let features = CaseFeatures::extract(
            "BP 170/95, HR 72, temp 39.1, SpO2 97%, RR 18.",
            None,
        )
        .unwrap();
        assert_eq!(features.vital_sign_count, 5);
        // BP systolic >= 160 and temperature >= 38.5
        assert_eq!(features.vital_anomaly_count, 2);
    }

    #[test]
    fn test_fahrenheit_temperature() {
        let normal = CaseFeatures::extract("Temperature was 98.6 today.", None).unwrap();
        assert_eq!(normal.vital_sign_count, 1);
        assert_eq!(normal.vital_anomaly_count, 0);

        let febrile = CaseFeatures::extract("Temp: 102.4", None).unwrap();
        assert_eq!(febrile.vital_anomaly_count, 1);
    }

    #[test]
    fn test_low_saturation_is_anomaly() {
        let features = CaseFeatures::extract("O2 sat 88 on room air", None).unwrap();
        assert_eq!(features.vital_sign_count, 1);
        assert_eq!(features.vital_anomaly_count, 1);
    }

    #[test]
    fn test_differential_markers() {
        let features = CaseFeatures::extract(
            "Rule out pneumonia. Bronchitis versus asthma, r/o PE.",
            None,
        )
        .unwrap();
        assert_eq!(features.differential_count, 3);
    }

    #[test]
    fn test_flags() {
        let features = CaseFeatures::extract(
            "4 year old with possibly a seizure this morning.",
            None,
        )
        .unwrap();
        assert!(features.pediatric);
        assert!(features.ambiguous);
        assert!(features.emergency);
    }

    #[test]
    fn test_adult_age_is_not_pediatric() {
        let features = CaseFeatures::extract("54 y/o male, cough for 5 years.", None).unwrap();
        assert!(!features.pediatric);
        assert!(!features.emergency);
        assert!(!features.ambiguous);
    }

    #[test]
    fn test_transcript_chars_counts_characters() {
        let features = CaseFeatures::extract("café", None).unwrap();
        assert_eq!(features.transcript_chars, 4);
    }

    #[test]
    fn test_hints_override_heuristics() {
        let hints = StructuredHints {
            symptom_count: Some(7),
            medication_count: Some(0),
            emergency: Some(true),
            ..Default::default()
        };
        let features =
            CaseFeatures::extract("Cough and fever, takes aspirin.", Some(&hints)).unwrap();
        assert_eq!(features.symptom_count, 7);
        assert_eq!(features.medication_count, 0);
        assert!(features.emergency);
        // Not hinted: falls back to the heuristic
        assert!(!features.pediatric);
    }

    #[test]
    fn test_hints_deserialize_from_partial_map() {
        let hints: StructuredHints =
            serde_json::from_str(r#"{"medication_count": 3, "pediatric": true}"#).unwrap();
        assert_eq!(hints.medication_count, Some(3));
        assert_eq!(hints.pediatric, Some(true));
        assert_eq!(hints.symptom_count, None);
    }
}
