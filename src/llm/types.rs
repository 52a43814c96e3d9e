//! Analysis result types — DetectionResult and Severity.
//!
//! The model returns snake_case JSON whose flag and severity keys depend on
//! the active profile (see profile.rs). The parser maps it into these types;
//! presentation consumers see camelCase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel for `atmospheric_conditions` when the image is not a sky image.
pub const NOT_APPLICABLE: &str = "N/A";

/// Ordinal severity of the detected trail pattern.
///
/// Three-level profiles stop at `High`; four-level profiles admit `Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }

    /// Case-insensitive lookup of a wire label. Arity is checked by the profile.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(label))
    }

    /// Long form shown on the result screen.
    pub fn headline(self) -> &'static str {
        match self {
            Severity::Low => "Minimal Climate Impact",
            Severity::Medium => "Moderate Warming Effect",
            Severity::High => "Significant Heat Trapping",
            Severity::Critical => "Extreme Persistence",
        }
    }

    /// Short form shown in history rows.
    pub fn short_label(self) -> &'static str {
        match self {
            Severity::Low => "Minimal Impact",
            Severity::Medium => "Warming Effect",
            Severity::High => "Heat Trapping",
            Severity::Critical => "Extreme",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Severity::Low => "green",
            Severity::Medium => "orange",
            Severity::High => "red",
            Severity::Critical => "purple",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified scan, as produced by the result parser.
///
/// Held in memory by the orchestrator until the user saves or discards it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub is_valid_image: bool,
    pub has_anomaly_flag: bool,
    pub explanation: String,
    pub confidence_score: f64,
    pub detected_patterns: Vec<String>,
    pub atmospheric_conditions: String,
    pub severity_level: Severity,
}

impl DetectionResult {
    /// Force the "not a sky image" shape: no patterns, N/A conditions,
    /// lowest severity, no anomaly. Returns true if anything changed.
    pub(crate) fn coerce_invalid(&mut self) -> bool {
        if self.is_valid_image {
            return false;
        }
        let changed = !self.detected_patterns.is_empty()
            || self.atmospheric_conditions != NOT_APPLICABLE
            || self.severity_level != Severity::Low
            || self.has_anomaly_flag;
        self.detected_patterns.clear();
        self.atmospheric_conditions = NOT_APPLICABLE.to_string();
        self.severity_level = Severity::Low;
        self.has_anomaly_flag = false;
        changed
    }
}
