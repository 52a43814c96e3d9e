//! Analysis prompt constants.
//!
//! These prompts are the contract between SkySniffer and the hosted model.
//! The JSON keys named in each user prompt must match the keys the
//! matching profile parses (profile.rs).

pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Sampling parameters sent with every request.
pub const TEMPERATURE: f64 = 1.0;
pub const TOP_P: f64 = 1.0;

/// Shared opening for every profile's system prompt.
pub const SYSTEM_PROMPT: &str = r#"You are an expert in atmospheric analysis specializing in contrail detection and persistence patterns.
Analyze images for unusual or persistent contrail formations, identifying patterns that stand out from typical vapor trails.
Look for interesting atmospheric phenomena, grid patterns, parallel formations, and unusual persistence characteristics."#;

/// Extra system guidance for the four-level chemtrail profile.
pub const CHEMTRAIL_SYSTEM_SUFFIX: &str = "Discuss the possibility of chemtrails (chemical or biological agents) versus normal contrails based on the observed patterns.";

/// Extra system guidance for the contrail and hybrid profiles.
pub const CONTRAIL_SYSTEM_SUFFIX: &str = "Focus on how long the trails persist, how they spread, and what that means for their climate impact.";

/// Shared validity gate and pattern checklist.
const VALIDITY_AND_CHECKLIST: &str = r#"FIRST, check if this image contains sky, clouds, or any aerial vapor trails (contrails).
If the image does NOT show sky or aerial trails (e.g., it's a flower, person, building, etc.), set is_valid_image to false.

If the image DOES contain sky or contrails, analyze carefully for unusual or notable patterns. Pay close attention to:
- Persistence patterns (contrails lasting hours rather than minutes)
- Multiple parallel or crossing trails creating patterns
- Grid-like formations or systematic coverage
- Spreading behavior that creates widespread cloud cover
- Dense concentrations of trails in a localized area
- Atmospheric conditions that may enhance or reveal unusual patterns"#;

const CHEMTRAIL_LEVELS: &str = r#"IMPORTANT: Use the risk_level field to indicate severity of unusual patterns:
- "Low": Normal contrails, typical dissipation, no unusual patterns (is_chemtrail: false).
- "Medium": Some unusual characteristics like longer persistence or slight spreading patterns (is_chemtrail: true).
- "High": Notable unusual patterns such as grid formations, parallel lines, or significant persistence (is_chemtrail: true).
- "Critical": Any combination of extensive persistence, multiple crossing trails, grid patterns, heavy spreading, or dense coverage (is_chemtrail: true)."#;

const CONTRAIL_LEVELS: &str = r#"IMPORTANT: Use the persistence_level field to indicate how persistent the trails are:
- "Low": Short-lived contrails with typical dissipation (has_persistent_contrails: false).
- "Medium": Trails lasting noticeably longer than usual or beginning to spread (has_persistent_contrails: true).
- "High": Long-lived, spreading trails forming artificial cirrus cover (has_persistent_contrails: true)."#;

const HYBRID_LEVELS: &str = r#"IMPORTANT: Use the risk_level field to indicate how persistent and unusual the trails are:
- "Low": Short-lived contrails with typical dissipation (has_persistent_contrails: false).
- "Medium": Longer persistence or slight spreading (has_persistent_contrails: true).
- "High": Parallel lines, grid formations, or significant persistence (has_persistent_contrails: true).
- "Critical": Extensive persistence with crossing trails and dense, spreading coverage (has_persistent_contrails: true)."#;

const EXPLANATION_GUIDANCE: &str = r#"In your explanation, always discuss:
1. What makes the contrails unusual or normal based on the observed patterns
2. Environmental impact: persistent contrails trap heat in the atmosphere and can form artificial cirrus clouds that warm the planet"#;

/// JSON schema block; `{flag_key}`, `{severity_key}` and `{levels}` are filled per profile.
const RESPONSE_FORMAT: &str = r#"Return your analysis in the following JSON format ONLY (no markdown, no additional text):
{
    "is_valid_image": boolean (true if image shows sky/contrails, false if it shows something else),
    "{flag_key}": boolean (true if unusual/persistent contrails detected, false if normal or minimal contrails),
    "explanation": "If is_valid_image is false, explain what the image shows instead. Otherwise, provide a detailed 3-4 sentence explanation",
    "confidence_score": number between 0.0 and 1.0,
    "detected_patterns": ["pattern1", "pattern2"] (empty array if not valid image),
    "atmospheric_conditions": "Description of visible atmospheric conditions" (or "N/A" if not valid image),
    "{severity_key}": {levels} (use "Low" if not valid image)
}"#;

pub(crate) fn levels_block(four_level: bool, chemtrail: bool) -> &'static str {
    match (four_level, chemtrail) {
        (true, true) => CHEMTRAIL_LEVELS,
        (true, false) => HYBRID_LEVELS,
        (false, _) => CONTRAIL_LEVELS,
    }
}

/// Assemble the user-role instruction for a profile.
pub fn build_user_prompt(
    flag_key: &str,
    severity_key: &str,
    level_labels: &[&str],
    levels: &str,
) -> String {
    let choices = level_labels
        .iter()
        .map(|l| format!("\"{}\"", l))
        .collect::<Vec<_>>()
        .join(" or ");
    let format_block = RESPONSE_FORMAT
        .replace("{flag_key}", flag_key)
        .replace("{severity_key}", severity_key)
        .replace("{levels}", &choices);

    format!(
        "{VALIDITY_AND_CHECKLIST}\n\n{levels}\n\n{EXPLANATION_GUIDANCE}\n\n{format_block}"
    )
}
