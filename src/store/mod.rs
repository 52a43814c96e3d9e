//! Record store domain — persisted scan history.
//!
//! The store itself is external to the scan lifecycle; this module only
//! maps validated results to records and back.
//!
//!   - RecordStore trait — save / list / load_image / delete
//!   - file.rs           — JSON index + out-of-line image files

mod file;

pub use file::JsonFileStore;

use crate::error::ScanError;
use crate::llm::{DetectionResult, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Opaque record identifier, assigned at save time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// One saved scan. Immutable once written; removed only by delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    pub is_valid_image: bool,
    pub has_anomaly_flag: bool,
    pub explanation: String,
    pub confidence_score: f64,
    pub detected_patterns: Vec<String>,
    pub atmospheric_conditions: String,
    pub severity_level: Severity,
    /// File name of the out-of-line JPEG, relative to the store's image dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_file: Option<String>,
}

impl ScanRecord {
    pub fn from_detection(
        detection: &DetectionResult,
        id: RecordId,
        timestamp: DateTime<Utc>,
        image_file: Option<String>,
    ) -> Self {
        Self {
            id,
            timestamp,
            is_valid_image: detection.is_valid_image,
            has_anomaly_flag: detection.has_anomaly_flag,
            explanation: detection.explanation.clone(),
            confidence_score: detection.confidence_score,
            detected_patterns: detection.detected_patterns.clone(),
            atmospheric_conditions: detection.atmospheric_conditions.clone(),
            severity_level: detection.severity_level,
            image_file,
        }
    }

    /// The stored result in display form.
    pub fn detection(&self) -> DetectionResult {
        DetectionResult {
            is_valid_image: self.is_valid_image,
            has_anomaly_flag: self.has_anomaly_flag,
            explanation: self.explanation.clone(),
            confidence_score: self.confidence_score,
            detected_patterns: self.detected_patterns.clone(),
            atmospheric_conditions: self.atmospheric_conditions.clone(),
            severity_level: self.severity_level,
        }
    }
}

/// Persistence for saved scans.
pub trait RecordStore: Send + Sync {
    /// Persist a result. Id and timestamp are assigned here.
    fn save(&self, result: &DetectionResult, image: Option<&[u8]>) -> Result<RecordId, ScanError>;

    /// All records, most recent first.
    fn list(&self) -> Result<Vec<ScanRecord>, ScanError>;

    /// Whether image bytes are on hand for a record. Does not read them.
    fn has_image(&self, record: &ScanRecord) -> bool;

    /// Image bytes for a record, if one was stored.
    fn load_image(&self, record: &ScanRecord) -> Result<Option<Vec<u8>>, ScanError>;

    /// Remove records. Unknown ids are ignored.
    fn delete(&self, ids: &HashSet<RecordId>) -> Result<(), ScanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trips_detection() {
        let detection = DetectionResult {
            is_valid_image: true,
            has_anomaly_flag: false,
            explanation: "Short-lived trail.".to_string(),
            confidence_score: 0.4,
            detected_patterns: vec!["Single trail".to_string()],
            atmospheric_conditions: "Dry".to_string(),
            severity_level: Severity::Low,
        };
        let record = ScanRecord::from_detection(&detection, RecordId::new(), Utc::now(), None);
        assert_eq!(record.detection(), detection);
    }

    #[test]
    fn record_id_parses_display_form() {
        let id = RecordId::new();
        let parsed: RecordId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<RecordId>().is_err());
    }
}
