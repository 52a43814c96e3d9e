//! LLM domain — request building, the hosted-model call, result parsing.
//!
//! Public API for the analysis half of a scan. The orchestrator (scan/)
//! should only use what is exported here.
//!
//!   - profile.rs — prompt/result variant selection
//!   - prompts.rs — prompt text + sampling constants
//!   - request.rs — image → JPEG → data URI → payload
//!   - client.rs  — InferenceClient trait + reqwest implementation
//!   - parse.rs   — raw text → validated DetectionResult

pub mod client;
pub mod parse;
pub mod profile;
pub mod prompts;
pub mod request;
pub mod types;

pub use client::{HttpInferenceClient, InferenceClient};
pub use parse::{parse_detection, serialize_detection};
pub use profile::AnalysisProfile;
pub use request::{build_request, AnalysisRequest};
pub use types::{DetectionResult, Severity, NOT_APPLICABLE};
