//! Confidence extraction from persona responses.
//!
//! Gateways that only return text (no structured confidence field) rely on
//! these helpers. Pure text matching, no I/O.
//!
//! | Format | Example |
//! |--------|---------|
//! | JSON (preferred) | `{"confidence": 0.82, ...}` |
//! | Labelled | `Confidence: 0.82` or `confidence = 82%` |

use regex::Regex;
use std::sync::LazyLock;

static LABELLED_CONFIDENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)confidence\s*(?:score)?\s*[:=]\s*([0-9]+(?:\.[0-9]+)?)\s*(%)?")
        .expect("valid confidence regex")
});

/// Extract a confidence in `0..=1` from a persona response.
///
/// Values between 1 and 100 are read as percentages. Returns `None` when no
/// confidence can be found; callers decide the fallback.
///
/// ```
/// use middleware_domain::orchestration::confidence::parse_confidence;
///
/// assert_eq!(parse_confidence(r#"{"confidence": 0.8, "note": "ok"}"#), Some(0.8));
/// assert_eq!(parse_confidence("Confidence: 92%"), Some(0.92));
/// assert_eq!(parse_confidence("no score"), None);
/// ```
pub fn parse_confidence(response: &str) -> Option<f64> {
    if let Some(start) = response.find('{')
        && let Some(end) = response[start..].rfind('}')
    {
        let json_str = &response[start..start + end + 1];
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(json_str)
            && let Some(value) = parsed.get("confidence").and_then(|v| v.as_f64())
        {
            return Some(normalize(value, false));
        }
    }

    let captures = LABELLED_CONFIDENCE.captures(response)?;
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some(normalize(value, captures.get(2).is_some()))
}

fn normalize(value: f64, percent: bool) -> f64 {
    let value = if percent || value > 1.0 {
        value / 100.0
    } else {
        value
    };
    value.clamp(0.0, 1.0)
}
