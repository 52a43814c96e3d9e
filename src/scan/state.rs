//! Scan lifecycle states and the snapshot published to observers.

use crate::error::{FailureKind, ScanError};
use crate::llm::DetectionResult;
use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;

/// Internal state. Holds the source image for every non-idle state so
/// retry and save never need the caller to hand it back.
#[derive(Debug, Clone)]
pub enum ScanState {
    Idle,
    Scanning {
        image: Arc<DynamicImage>,
    },
    ResultReady {
        image: Arc<DynamicImage>,
        result: DetectionResult,
        /// JPEG produced for the request, reused for persistence.
        jpeg: Arc<Vec<u8>>,
    },
    Failed {
        image: Arc<DynamicImage>,
        error: ScanError,
    },
}

impl ScanState {
    pub fn name(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Scanning { .. } => "scanning",
            ScanState::ResultReady { .. } => "result ready",
            ScanState::Failed { .. } => "failed",
        }
    }

    pub fn image(&self) -> Option<&Arc<DynamicImage>> {
        match self {
            ScanState::Idle => None,
            ScanState::Scanning { image }
            | ScanState::ResultReady { image, .. }
            | ScanState::Failed { image, .. } => Some(image),
        }
    }

    pub fn status(&self) -> ScanStatus {
        match self {
            ScanState::Idle => ScanStatus::Idle,
            ScanState::Scanning { .. } => ScanStatus::Scanning,
            ScanState::ResultReady { result, .. } => ScanStatus::ResultReady {
                result: result.clone(),
            },
            ScanState::Failed { error, .. } => ScanStatus::Failed {
                kind: error.kind(),
                message: error.user_message().to_string(),
                suggestion: error.recovery_suggestion().to_string(),
                retryable: error.is_retryable(),
            },
        }
    }
}

/// What presentation layers see. Carries no image data and no raw error detail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ScanStatus {
    Idle,
    Scanning,
    #[serde(rename_all = "camelCase")]
    ResultReady { result: DetectionResult },
    #[serde(rename_all = "camelCase")]
    Failed {
        kind: FailureKind,
        message: String,
        suggestion: String,
        retryable: bool,
    },
}

impl ScanStatus {
    pub fn is_idle(&self) -> bool {
        matches!(self, ScanStatus::Idle)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ScanStatus::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        match self {
            ScanStatus::ResultReady { result } => Some(result),
            _ => None,
        }
    }
}
