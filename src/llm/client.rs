//! Inference client — one outbound call to the hosted vision model.
//!
//! Exactly one attempt per invocation. Retrying is the user's call, made
//! through the orchestrator.

use super::request::AnalysisRequest;
use crate::error::ScanError;
use async_trait::async_trait;
use std::time::Duration;

/// Anything that can turn an analysis request into raw model text.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn complete(&self, request: &AnalysisRequest) -> Result<String, ScanError>;
}

#[async_trait]
impl<T: InferenceClient + ?Sized> InferenceClient for std::sync::Arc<T> {
    async fn complete(&self, request: &AnalysisRequest) -> Result<String, ScanError> {
        (**self).complete(request).await
    }
}

/// OpenAI-compatible chat-completions client (direct or through a key proxy).
pub struct HttpInferenceClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    wait: Duration,
}

impl HttpInferenceClient {
    pub fn new(endpoint: &str, api_key: Option<String>, wait: Duration) -> Result<Self, ScanError> {
        let http = reqwest::Client::builder()
            .timeout(wait)
            .build()
            .map_err(|e| ScanError::TransportError(format!("client build failed: {}", e)))?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            wait,
        })
    }

    pub fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.endpoint)
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn complete(&self, request: &AnalysisRequest) -> Result<String, ScanError> {
        log::info!("[LLM] Model: {}", request.model);
        log::info!("[LLM] Wait bound: {}s", self.wait.as_secs());

        let start = std::time::Instant::now();
        let mut builder = self
            .http
            .post(self.url())
            .header("content-type", "application/json")
            .json(&request.to_payload());

        if let Some(key) = &self.api_key {
            // AIProxy partial keys travel in their own header.
            builder = if key.starts_with("v2|") {
                builder.header("aiproxy-partial-key", key)
            } else {
                builder.bearer_auth(key)
            };
        }

        let response = builder.send().await.map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            log::error!("[LLM] API returned {}: {}", status, preview);
            return Err(match status.as_u16() {
                429 => ScanError::RateLimited,
                401 | 403 => ScanError::ApiKeyInvalid,
                code => ScanError::TransportError(format!("HTTP {}", code)),
            });
        }

        log::info!("[LLM] TTFB: {}ms", start.elapsed().as_millis());

        let body: serde_json::Value = response.json().await.map_err(classify_transport)?;
        log::info!("[LLM] API latency: {}ms", start.elapsed().as_millis());

        if let Some(usage) = body.get("usage") {
            log::info!(
                "[LLM] Tokens: {} in / {} out",
                usage["prompt_tokens"].as_u64().unwrap_or(0),
                usage["completion_tokens"].as_u64().unwrap_or(0)
            );
        }

        extract_content(&body)
    }
}

/// First choice's message content, or `NoResponseContent`.
pub fn extract_content(body: &serde_json::Value) -> Result<String, ScanError> {
    let content = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            log::error!("[LLM] No response content");
            ScanError::NoResponseContent
        })?;
    log::debug!("[LLM] Raw content: {}", content);
    Ok(content.to_string())
}

fn classify_transport(e: reqwest::Error) -> ScanError {
    if e.is_timeout() {
        log::error!("[LLM] Request timed out: {}", e);
        ScanError::Timeout
    } else if e.is_connect() {
        log::error!("[LLM] Connection failed: {}", e);
        ScanError::NetworkUnreachable
    } else {
        log::error!("[LLM] HTTP request failed: {}", e);
        ScanError::TransportError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_first_choice_content() {
        let body = json!({
            "choices": [
                { "message": { "role": "assistant", "content": "{\"a\": 1}" } },
                { "message": { "role": "assistant", "content": "ignored" } }
            ]
        });
        assert_eq!(extract_content(&body).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn missing_or_blank_content_is_no_response() {
        for body in [
            json!({}),
            json!({ "choices": [] }),
            json!({ "choices": [{ "message": { "content": null } }] }),
            json!({ "choices": [{ "message": { "content": "   " } }] }),
        ] {
            assert_eq!(extract_content(&body), Err(ScanError::NoResponseContent));
        }
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let client =
            HttpInferenceClient::new("https://proxy.example/", None, Duration::from_secs(20))
                .unwrap();
        assert_eq!(client.url(), "https://proxy.example/v1/chat/completions");
    }
}
