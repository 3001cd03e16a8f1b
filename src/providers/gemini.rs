//! Gemini `generateContent` client
//!
//! API Docs: https://ai.google.dev/api/generate-content

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AssistantSettings;
use crate::providers::http_client::RateLimitedClient;
use crate::providers::traits::{AssistantProvider, ProviderError, ProviderResult};

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Gemini API client
pub struct GeminiProvider {
    client: RateLimitedClient,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

impl GeminiProvider {
    /// Create a provider from settings; fails if no API key is configured
    pub fn new(settings: &AssistantSettings) -> ProviderResult<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "TRYON__ASSISTANT__API_KEY is not set".to_string(),
            ));
        }

        let client = RateLimitedClient::new(
            settings.rate_limit_per_minute,
            Duration::from_secs(settings.timeout_secs),
        )?;

        Ok(GeminiProvider {
            client,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            max_retries: settings.max_retries,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Pull the first candidate's first text part out of a response body
fn extract_text(body: &str) -> ProviderResult<String> {
    let response: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(500).collect();
        ProviderError::ParseError(format!("JSON parse error: {} - Body: {}", e, preview))
    })?;

    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or_else(|| ProviderError::ParseError("Response contained no candidate text".to_string()))
}

#[async_trait]
impl AssistantProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> ProviderResult<String> {
        let url = self.endpoint();
        debug!(url = %url, prompt_chars = prompt.chars().count(), "Gemini API request");

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send_with_retry(self.max_retries)
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        let reply = extract_text(&text)?;

        info!(
            model = %self.model,
            reply_chars = reply.chars().count(),
            remaining = ?self.client.remaining_requests(),
            "Gemini reply received"
        );

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: &str) -> AssistantSettings {
        AssistantSettings {
            api_key: api_key.to_string(),
            base_url: "https://example.test/".to_string(),
            ..AssistantSettings::default()
        }
    }

    #[test]
    fn test_missing_key_not_configured() {
        let result = GeminiProvider::new(&settings("  "));
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn test_endpoint() {
        let provider = GeminiProvider::new(&settings("k")).unwrap();
        assert_eq!(
            provider.endpoint(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: "hello" }],
            }],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"contents": [{"parts": [{"text": "hello"}]}]})
        );
    }

    #[test]
    fn test_extract_text() {
        let body = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "Try the blue shirt."}, {"text": "ignored"}], "role": "model"}},
                {"content": {"parts": [{"text": "second candidate"}]}}
            ]
        }"#;
        assert_eq!(extract_text(body).unwrap(), "Try the blue shirt.");
    }

    #[test]
    fn test_extract_text_missing_candidates() {
        assert!(matches!(extract_text(r#"{"candidates": []}"#), Err(ProviderError::ParseError(_))));
        assert!(matches!(extract_text(r#"{}"#), Err(ProviderError::ParseError(_))));
        assert!(matches!(extract_text("not json"), Err(ProviderError::ParseError(_))));
    }
}
