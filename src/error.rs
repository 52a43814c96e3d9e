//! Scan error taxonomy.
//!
//! Every failure in the scan lifecycle is one of these variants. The
//! orchestrator maps them to a `FailureKind` plus user-facing text; raw
//! details stay in the logs and never reach a persisted record.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanError {
    #[error("image could not be encoded as JPEG")]
    ImageEncodingFailed,

    #[error("model response contained no text content")]
    NoResponseContent,

    #[error("model response was malformed: {0}")]
    MalformedResult(String),

    #[error("inference call exceeded its wait bound")]
    Timeout,

    #[error("network unreachable")]
    NetworkUnreachable,

    #[error("rate limited by inference service")]
    RateLimited,

    #[error("inference service rejected the API key")]
    ApiKeyInvalid,

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("a scan is already in progress")]
    ScanInProgress,

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("scan cancelled")]
    Cancelled,
}

/// Coarse failure class shown to presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    ImageEncodingFailed,
    NoResponseContent,
    MalformedResult,
    Timeout,
    NetworkUnreachable,
    RateLimited,
    ApiKeyInvalid,
    TransportError,
    StoreUnavailable,
    Rejected,
    Cancelled,
}

impl ScanError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ScanError::ImageEncodingFailed => FailureKind::ImageEncodingFailed,
            ScanError::NoResponseContent => FailureKind::NoResponseContent,
            ScanError::MalformedResult(_) => FailureKind::MalformedResult,
            ScanError::Timeout => FailureKind::Timeout,
            ScanError::NetworkUnreachable => FailureKind::NetworkUnreachable,
            ScanError::RateLimited => FailureKind::RateLimited,
            ScanError::ApiKeyInvalid => FailureKind::ApiKeyInvalid,
            ScanError::TransportError(_) => FailureKind::TransportError,
            ScanError::StoreUnavailable(_) => FailureKind::StoreUnavailable,
            ScanError::ScanInProgress | ScanError::InvalidTransition { .. } => {
                FailureKind::Rejected
            }
            ScanError::Cancelled => FailureKind::Cancelled,
        }
    }

    /// Message safe to show the user. Carries no raw transport or parse detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            ScanError::ImageEncodingFailed => {
                "Failed to convert image to JPEG format. Please try a different image."
            }
            ScanError::NoResponseContent => {
                "No response received from AI service. Please try again."
            }
            ScanError::MalformedResult(_) => {
                "Received invalid response from AI service. Please try again."
            }
            ScanError::Timeout => "Request timed out. Please try again.",
            ScanError::NetworkUnreachable => {
                "No internet connection. Please check your network and try again."
            }
            ScanError::RateLimited => "Too many requests. Please wait a moment and try again.",
            ScanError::ApiKeyInvalid => "API configuration error. Please contact support.",
            ScanError::TransportError(_) => "Unable to analyze image. Please try again.",
            ScanError::StoreUnavailable(_) => "Could not save this scan. Please try again.",
            ScanError::ScanInProgress => "A scan is already in progress.",
            ScanError::InvalidTransition { .. } => "That action is not available right now.",
            ScanError::Cancelled => "Scan cancelled.",
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ScanError::ImageEncodingFailed => {
                "Try taking a new photo or selecting a different image from your library."
            }
            ScanError::NoResponseContent | ScanError::MalformedResult(_) => {
                "This might be a temporary issue. Please try again in a moment."
            }
            ScanError::Timeout => "Try again, ideally with a stronger connection.",
            ScanError::NetworkUnreachable | ScanError::TransportError(_) => {
                "Make sure you're connected to the internet and try again."
            }
            ScanError::RateLimited => "Wait a few seconds before trying to scan another image.",
            ScanError::ApiKeyInvalid => "Please contact the app developer for assistance.",
            ScanError::StoreUnavailable(_) => "Your result is still on screen; try saving again.",
            ScanError::ScanInProgress => "Wait for the current scan to finish.",
            ScanError::InvalidTransition { .. } | ScanError::Cancelled => "",
        }
    }

    /// Whether re-running the same image is a sensible next step.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ScanError::ImageEncodingFailed
                | ScanError::ApiKeyInvalid
                | ScanError::InvalidTransition { .. }
        )
    }
}
