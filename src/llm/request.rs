//! Analysis request builder — image → JPEG → data URI → chat payload.
//!
//! No I/O happens here. The encoded JPEG is kept on the request so the
//! orchestrator can persist the same bytes without encoding twice.

use super::profile::AnalysisProfile;
use super::prompts::{TEMPERATURE, TOP_P};
use crate::error::ScanError;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

/// JPEG quality factor (0-100) for both the upload and the stored copy.
pub const JPEG_QUALITY: u8 = 80;

/// A fully built inference request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub profile: AnalysisProfile,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub image_data_uri: String,
    pub jpeg_bytes: Vec<u8>,
}

impl AnalysisRequest {
    /// Chat-completions body with JSON-object response format.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": self.system_prompt,
                },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": self.user_prompt },
                        {
                            "type": "image_url",
                            "image_url": { "url": self.image_data_uri, "detail": "auto" }
                        }
                    ]
                }
            ],
            "response_format": { "type": "json_object" },
            "temperature": TEMPERATURE,
            "top_p": TOP_P,
        })
    }
}

/// Encode an image to JPEG at `JPEG_QUALITY`.
///
/// Alpha and high-bit-depth images are flattened to RGB8 first since
/// JPEG carries neither.
pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, ScanError> {
    if image.width() == 0 || image.height() == 0 {
        log::warn!("[REQUEST] Refusing to encode empty {}x{} image", image.width(), image.height());
        return Err(ScanError::ImageEncodingFailed);
    }

    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| {
            log::error!("[REQUEST] JPEG encode failed: {}", e);
            ScanError::ImageEncodingFailed
        })?;

    if bytes.is_empty() {
        return Err(ScanError::ImageEncodingFailed);
    }
    Ok(bytes)
}

/// Wrap JPEG bytes as a base64 `data:` URI.
pub fn to_data_uri(jpeg: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg);
    format!("data:image/jpeg;base64,{}", encoded)
}

/// Build the outbound request for one scan.
pub fn build_request(
    image: &DynamicImage,
    profile: AnalysisProfile,
    model: &str,
) -> Result<AnalysisRequest, ScanError> {
    let start = std::time::Instant::now();
    let jpeg_bytes = encode_jpeg(image)?;
    let image_data_uri = to_data_uri(&jpeg_bytes);

    log::info!(
        "[REQUEST] Encoded {}x{} → {} bytes JPEG in {}ms (profile={})",
        image.width(),
        image.height(),
        jpeg_bytes.len(),
        start.elapsed().as_millis(),
        profile
    );

    Ok(AnalysisRequest {
        profile,
        model: model.to_string(),
        system_prompt: profile.system_prompt(),
        user_prompt: profile.user_prompt(),
        image_data_uri,
        jpeg_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sky(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([110, 160, 230, 255])))
    }

    #[test]
    fn builds_jpeg_data_uri() {
        let req = build_request(&sky(32, 24), AnalysisProfile::Contrail, "gpt-4o").unwrap();
        assert!(req.image_data_uri.starts_with("data:image/jpeg;base64,"));
        // JPEG SOI marker
        assert_eq!(&req.jpeg_bytes[..2], &[0xFF, 0xD8]);
        let encoded = req.image_data_uri.trim_start_matches("data:image/jpeg;base64,");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(decoded, req.jpeg_bytes);
    }

    #[test]
    fn empty_image_fails_to_encode() {
        let err = build_request(&sky(0, 0), AnalysisProfile::Contrail, "gpt-4o").unwrap_err();
        assert_eq!(err, ScanError::ImageEncodingFailed);
    }

    #[test]
    fn payload_declares_json_object_and_image() {
        let req = build_request(&sky(8, 8), AnalysisProfile::Chemtrail, "gpt-4o").unwrap();
        let payload = req.to_payload();
        assert_eq!(payload["model"], "gpt-4o");
        assert_eq!(payload["response_format"]["type"], "json_object");
        assert_eq!(payload["temperature"], 1.0);
        assert_eq!(payload["top_p"], 1.0);
        assert_eq!(payload["messages"][0]["role"], "system");
        let parts = payload["messages"][1]["content"].as_array().unwrap();
        assert_eq!(parts[0]["type"], "text");
        assert!(parts[0]["text"].as_str().unwrap().contains("risk_level"));
        assert_eq!(parts[1]["image_url"]["detail"], "auto");
    }
}
