//! Result parser/validator — raw model text → DetectionResult.
//!
//! Pure and deterministic. Keys are read through the active profile, so
//! one parser serves every prompt variant.

use super::profile::AnalysisProfile;
use super::types::{DetectionResult, Severity};
use crate::error::ScanError;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

const KEY_VALID: &str = "is_valid_image";
const KEY_EXPLANATION: &str = "explanation";
const KEY_CONFIDENCE: &str = "confidence_score";
const KEY_PATTERNS: &str = "detected_patterns";
const KEY_CONDITIONS: &str = "atmospheric_conditions";

/// Remove a surrounding ```json … ``` fence if the model added one anyway.
pub fn strip_code_fences(raw: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n?(.*?)\s*```\s*$").expect("static regex")
    });
    match fence.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

/// Parse and validate the model's output for `profile`.
///
/// When the model reports `is_valid_image: false` the sky-only fields are
/// coerced to their "not applicable" shape rather than trusted.
pub fn parse_detection(raw: &str, profile: AnalysisProfile) -> Result<DetectionResult, ScanError> {
    let json_str = strip_code_fences(raw);
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| ScanError::MalformedResult(format!("invalid JSON: {}", e)))?;
    let obj = value
        .as_object()
        .ok_or_else(|| malformed("top-level value is not an object"))?;

    let confidence_score = number(obj, KEY_CONFIDENCE)?;
    if !confidence_score.is_finite() || !(0.0..=1.0).contains(&confidence_score) {
        return Err(malformed(format!(
            "{} {} outside [0, 1]",
            KEY_CONFIDENCE, confidence_score
        )));
    }

    let severity_key = profile.severity_key();
    let label = string(obj, severity_key)?;
    let severity_level = Severity::from_label(&label)
        .filter(|s| profile.admits(*s))
        .ok_or_else(|| {
            malformed(format!(
                "{} '{}' is not one of {:?}",
                severity_key,
                label,
                profile.levels()
            ))
        })?;

    let mut result = DetectionResult {
        is_valid_image: boolean(obj, KEY_VALID)?,
        has_anomaly_flag: boolean(obj, profile.flag_key())?,
        explanation: string(obj, KEY_EXPLANATION)?,
        confidence_score,
        detected_patterns: string_list(obj, KEY_PATTERNS)?,
        atmospheric_conditions: string(obj, KEY_CONDITIONS)?,
        severity_level,
    };

    if result.coerce_invalid() {
        log::warn!("[PARSE] Model broke the invalid-image contract; coerced sky fields");
    }
    Ok(result)
}

/// Render a result in the wire shape `profile` expects.
pub fn serialize_detection(result: &DetectionResult, profile: AnalysisProfile) -> String {
    let mut obj = Map::new();
    obj.insert(KEY_VALID.into(), Value::Bool(result.is_valid_image));
    obj.insert(profile.flag_key().into(), Value::Bool(result.has_anomaly_flag));
    obj.insert(KEY_EXPLANATION.into(), Value::String(result.explanation.clone()));
    obj.insert(KEY_CONFIDENCE.into(), serde_json::json!(result.confidence_score));
    obj.insert(
        KEY_PATTERNS.into(),
        Value::Array(
            result
                .detected_patterns
                .iter()
                .cloned()
                .map(Value::String)
                .collect(),
        ),
    );
    obj.insert(
        KEY_CONDITIONS.into(),
        Value::String(result.atmospheric_conditions.clone()),
    );
    obj.insert(
        profile.severity_key().into(),
        Value::String(result.severity_level.as_str().to_string()),
    );
    Value::Object(obj).to_string()
}

fn malformed(detail: impl Into<String>) -> ScanError {
    ScanError::MalformedResult(detail.into())
}

fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a Value, ScanError> {
    obj.get(key)
        .ok_or_else(|| malformed(format!("missing field '{}'", key)))
}

fn boolean(obj: &Map<String, Value>, key: &str) -> Result<bool, ScanError> {
    field(obj, key)?
        .as_bool()
        .ok_or_else(|| malformed(format!("field '{}' is not a boolean", key)))
}

fn number(obj: &Map<String, Value>, key: &str) -> Result<f64, ScanError> {
    field(obj, key)?
        .as_f64()
        .ok_or_else(|| malformed(format!("field '{}' is not a number", key)))
}

fn string(obj: &Map<String, Value>, key: &str) -> Result<String, ScanError> {
    field(obj, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| malformed(format!("field '{}' is not a string", key)))
}

fn string_list(obj: &Map<String, Value>, key: &str) -> Result<Vec<String>, ScanError> {
    let items = field(obj, key)?
        .as_array()
        .ok_or_else(|| malformed(format!("field '{}' is not an array", key)))?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| malformed(format!("field '{}' has a non-string entry", key)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERSISTENT: &str = r#"{"is_valid_image": true, "has_persistent_contrails": true, "explanation": "Two long-lived parallel trails.", "confidence_score": 0.82, "detected_patterns": ["Parallel flight tracks","Contrail spreading"], "atmospheric_conditions": "High humidity, ice supersaturation", "persistence_level": "Medium"}"#;

    #[test]
    fn parses_contrail_profile() {
        let r = parse_detection(PERSISTENT, AnalysisProfile::Contrail).unwrap();
        assert!(r.is_valid_image);
        assert!(r.has_anomaly_flag);
        assert_eq!(r.confidence_score, 0.82);
        assert_eq!(r.detected_patterns.len(), 2);
        assert_eq!(r.severity_level, Severity::Medium);
    }

    #[test]
    fn wrong_profile_keys_are_malformed() {
        // Chemtrail profile expects is_chemtrail / risk_level.
        let err = parse_detection(PERSISTENT, AnalysisProfile::Chemtrail).unwrap_err();
        assert!(matches!(err, ScanError::MalformedResult(_)));
    }

    #[test]
    fn strips_markdown_fences() {
        let fenced = format!("```json\n{}\n```", PERSISTENT);
        assert!(parse_detection(&fenced, AnalysisProfile::Contrail).is_ok());
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let raw = PERSISTENT.replace("0.82", "1.3");
        let err = parse_detection(&raw, AnalysisProfile::Contrail).unwrap_err();
        assert!(matches!(err, ScanError::MalformedResult(ref d) if d.contains("outside")));
        let raw = PERSISTENT.replace("0.82", "-0.1");
        assert!(parse_detection(&raw, AnalysisProfile::Contrail).is_err());
    }

    #[test]
    fn rejects_critical_on_three_level_profile() {
        let raw = PERSISTENT.replace("\"Medium\"", "\"Critical\"");
        assert!(parse_detection(&raw, AnalysisProfile::Contrail).is_err());
        let hybrid = raw.replace("persistence_level", "risk_level");
        let r = parse_detection(&hybrid, AnalysisProfile::Hybrid).unwrap();
        assert_eq!(r.severity_level, Severity::Critical);
    }

    #[test]
    fn missing_fields_are_malformed() {
        for key in [
            "is_valid_image",
            "has_persistent_contrails",
            "explanation",
            "confidence_score",
            "detected_patterns",
            "atmospheric_conditions",
            "persistence_level",
        ] {
            let mut v: Value = serde_json::from_str(PERSISTENT).unwrap();
            v.as_object_mut().unwrap().remove(key);
            let err = parse_detection(&v.to_string(), AnalysisProfile::Contrail).unwrap_err();
            match err {
                ScanError::MalformedResult(detail) => assert!(detail.contains(key), "{}", detail),
                other => panic!("expected MalformedResult for {}, got {:?}", key, other),
            }
        }
    }

    #[test]
    fn non_json_is_malformed() {
        let err = parse_detection("I think these are contrails.", AnalysisProfile::Contrail)
            .unwrap_err();
        assert!(matches!(err, ScanError::MalformedResult(_)));
        assert!(parse_detection("[1, 2]", AnalysisProfile::Contrail).is_err());
    }

    #[test]
    fn invalid_image_is_coerced() {
        let raw = r#"{"is_valid_image": false, "has_persistent_contrails": true, "explanation": "This is a flower.", "confidence_score": 0.95, "detected_patterns": ["Petals"], "atmospheric_conditions": "Indoor lighting", "persistence_level": "High"}"#;
        let r = parse_detection(raw, AnalysisProfile::Contrail).unwrap();
        assert!(!r.is_valid_image);
        assert!(r.detected_patterns.is_empty());
        assert_eq!(r.atmospheric_conditions, "N/A");
        assert_eq!(r.severity_level, Severity::Low);
        assert!(!r.has_anomaly_flag);
    }

    #[test]
    fn serialize_then_parse_is_identity() {
        for profile in AnalysisProfile::ALL {
            for &level in profile.levels() {
                let original = DetectionResult {
                    is_valid_image: true,
                    has_anomaly_flag: level != Severity::Low,
                    explanation: "Grid of crossing trails \"overhead\".".to_string(),
                    confidence_score: 0.5,
                    detected_patterns: vec!["Grid pattern".to_string()],
                    atmospheric_conditions: "Cold, humid upper air".to_string(),
                    severity_level: level,
                };
                let wire = serialize_detection(&original, profile);
                assert_eq!(parse_detection(&wire, profile).unwrap(), original);
            }
        }
    }

    #[test]
    fn parsing_is_deterministic() {
        let a = parse_detection(PERSISTENT, AnalysisProfile::Contrail).unwrap();
        let b = parse_detection(PERSISTENT, AnalysisProfile::Contrail).unwrap();
        assert_eq!(a, b);
    }
}
