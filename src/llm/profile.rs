//! Analysis profiles — one strategy object per prompt/result variant.
//!
//! A profile decides which JSON keys carry the anomaly flag and the
//! severity, how many severity levels are admissible, which prompts are
//! sent, and how long to wait for the hosted model.

use super::prompts::{self, CHEMTRAIL_SYSTEM_SUFFIX, CONTRAIL_SYSTEM_SUFFIX, SYSTEM_PROMPT};
use super::types::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Shortest and longest wait bound accepted for an inference call.
pub const MIN_WAIT: Duration = Duration::from_secs(20);
pub const MAX_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisProfile {
    /// `is_chemtrail` / `risk_level`, four levels.
    Chemtrail,
    /// `has_persistent_contrails` / `persistence_level`, three levels.
    #[default]
    Contrail,
    /// `has_persistent_contrails` / `risk_level`, four levels.
    Hybrid,
}

impl AnalysisProfile {
    pub const ALL: [AnalysisProfile; 3] = [
        AnalysisProfile::Chemtrail,
        AnalysisProfile::Contrail,
        AnalysisProfile::Hybrid,
    ];

    pub fn id(self) -> &'static str {
        match self {
            AnalysisProfile::Chemtrail => "chemtrail",
            AnalysisProfile::Contrail => "contrail",
            AnalysisProfile::Hybrid => "hybrid",
        }
    }

    /// JSON key carrying the anomaly boolean.
    pub fn flag_key(self) -> &'static str {
        match self {
            AnalysisProfile::Chemtrail => "is_chemtrail",
            AnalysisProfile::Contrail | AnalysisProfile::Hybrid => "has_persistent_contrails",
        }
    }

    /// JSON key carrying the severity label.
    pub fn severity_key(self) -> &'static str {
        match self {
            AnalysisProfile::Contrail => "persistence_level",
            AnalysisProfile::Chemtrail | AnalysisProfile::Hybrid => "risk_level",
        }
    }

    pub fn is_four_level(self) -> bool {
        !matches!(self, AnalysisProfile::Contrail)
    }

    /// Admissible severity levels, lowest first.
    pub fn levels(self) -> &'static [Severity] {
        if self.is_four_level() {
            &Severity::ALL
        } else {
            &Severity::ALL[..3]
        }
    }

    pub fn admits(self, severity: Severity) -> bool {
        self.levels().contains(&severity)
    }

    /// Default wait bound for the inference call.
    pub fn default_wait(self) -> Duration {
        match self {
            AnalysisProfile::Chemtrail => Duration::from_secs(20),
            AnalysisProfile::Contrail => Duration::from_secs(30),
            AnalysisProfile::Hybrid => Duration::from_secs(60),
        }
    }

    pub fn system_prompt(self) -> String {
        let suffix = match self {
            AnalysisProfile::Chemtrail => CHEMTRAIL_SYSTEM_SUFFIX,
            AnalysisProfile::Contrail | AnalysisProfile::Hybrid => CONTRAIL_SYSTEM_SUFFIX,
        };
        format!("{}\n{}", SYSTEM_PROMPT, suffix)
    }

    pub fn user_prompt(self) -> String {
        let labels: Vec<&str> = self.levels().iter().map(|s| s.as_str()).collect();
        prompts::build_user_prompt(
            self.flag_key(),
            self.severity_key(),
            &labels,
            prompts::levels_block(
                self.is_four_level(),
                matches!(self, AnalysisProfile::Chemtrail),
            ),
        )
    }
}

impl fmt::Display for AnalysisProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AnalysisProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.id() == s)
            .ok_or_else(|| {
                format!(
                    "Unknown analysis profile '{}' (expected chemtrail, contrail or hybrid)",
                    s
                )
            })
    }
}

/// Clamp a requested wait bound into the supported range.
pub fn clamp_wait(requested: Duration) -> Duration {
    requested.clamp(MIN_WAIT, MAX_WAIT)
}
