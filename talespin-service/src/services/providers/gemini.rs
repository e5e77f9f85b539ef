//! Gemini AI provider implementation.
//!
//! Implements text generation using Google's Gemini `generateContent` API.
//! The response body is decoded leniently: several known layouts for the
//! candidate text are tried in order before the response is rejected.

use super::{GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Default Gemini API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider configuration.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Gemini text provider.
pub struct GeminiTextProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiTextProvider {
    /// The per-request timeout is applied by the caller; the client only
    /// bounds connection setup.
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Build the API URL for the given model and method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.config.api_base.trim_end_matches('/'),
            self.config.model,
            method,
            self.config.api_key
        )
    }

    /// Build generation config from parameters.
    fn build_generation_config(&self, params: &GenerationParams) -> GenerationConfig {
        GenerationConfig {
            temperature: params.temperature,
            top_p: params.top_p,
            max_output_tokens: params.max_tokens,
        }
    }
}

#[async_trait]
impl TextProvider for GeminiTextProvider {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![ContentPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(self.build_generation_config(params)),
        };

        let url = self.api_url("generateContent");

        tracing::debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            temperature = ?params.temperature,
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status,
                error_text.chars().take(200).collect::<String>()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError(e.without_url().to_string()))?;

        parse_response(&body)
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let url = format!(
            "{}/models?key={}",
            self.config.api_base.trim_end_matches('/'),
            self.config.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.without_url().to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }
}

/// Decode a `generateContent` body into generated text.
pub(crate) fn parse_response(body: &str) -> Result<ProviderResponse, ProviderError> {
    let api_response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

    let candidate = api_response
        .candidates
        .first()
        .ok_or(ProviderError::EmptyResponse)?;

    match candidate.finish_reason.as_deref() {
        Some("MAX_TOKENS") => return Err(ProviderError::Truncated),
        Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") => {
            return Err(ProviderError::ContentFiltered)
        }
        _ => {}
    }

    let text = candidate
        .text()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ProviderError::EmptyResponse)?;

    let usage = api_response.usage_metadata.unwrap_or_default();

    Ok(ProviderResponse {
        text,
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage.candidates_token_count.unwrap_or(0),
    })
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
struct ContentPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    /// Legacy layout: text directly on the candidate.
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Known layouts of a candidate's content, tried in declaration order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CandidateContent {
    Parts { parts: Vec<TextPart> },
    Text { text: String },
    Other(serde::de::IgnoredAny),
}

#[derive(Debug, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: Option<String>,
}

impl Candidate {
    fn text(&self) -> Option<&str> {
        let from_content = match &self.content {
            Some(CandidateContent::Parts { parts }) => {
                parts.iter().find_map(|p| p.text.as_deref())
            }
            Some(CandidateContent::Text { text }) => Some(text.as_str()),
            Some(CandidateContent::Other(_)) | None => None,
        };
        from_content.or(self.output.as_deref())
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_layout() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "  A tale.  "}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3}
        }"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.text, "A tale.");
        assert_eq!(response.input_tokens, 12);
        assert_eq!(response.output_tokens, 3);
    }

    #[test]
    fn test_flat_text_layout() {
        let body = r#"{"candidates": [{"content": {"text": "Flat tale."}}]}"#;
        assert_eq!(parse_response(body).unwrap().text, "Flat tale.");
    }

    #[test]
    fn test_legacy_output_layout() {
        let body = r#"{"candidates": [{"output": "Legacy tale."}]}"#;
        assert_eq!(parse_response(body).unwrap().text, "Legacy tale.");
    }

    #[test]
    fn test_truncated_is_rejected() {
        let body = r#"{"candidates": [{
            "content": {"parts": [{"text": "Once upon a"}]},
            "finishReason": "MAX_TOKENS"
        }]}"#;
        assert!(matches!(parse_response(body), Err(ProviderError::Truncated)));
    }

    #[test]
    fn test_safety_block_is_rejected() {
        let body = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        assert!(matches!(
            parse_response(body),
            Err(ProviderError::ContentFiltered)
        ));
    }

    #[test]
    fn test_missing_content_is_empty() {
        assert!(matches!(
            parse_response(r#"{"candidates": []}"#),
            Err(ProviderError::EmptyResponse)
        ));
        assert!(matches!(
            parse_response(r#"{"candidates": [{"content": {"role": "model"}}]}"#),
            Err(ProviderError::EmptyResponse)
        ));
        assert!(matches!(
            parse_response(r#"{"candidates": [{"content": {"parts": [{"text": "   "}]}}]}"#),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn test_garbage_is_api_error() {
        assert!(matches!(
            parse_response("<html>oops</html>"),
            Err(ProviderError::ApiError(_))
        ));
    }

    #[test]
    fn test_empty_key_is_not_configured() {
        let result = GeminiTextProvider::new(GeminiConfig {
            api_key: "  ".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_base: GEMINI_API_BASE.to_string(),
        });
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = GeminiConfig {
            api_key: "secret-key".to_string(),
            model: "m".to_string(),
            api_base: GEMINI_API_BASE.to_string(),
        };
        assert!(!format!("{:?}", config).contains("secret-key"));
    }
}
