//! Google Gemini provider (Generative Language API).
//!
//! Calls `POST {base}/models/{model}:generateContent` with the key in the
//! `x-goog-api-key` header. Blocked prompts and safety-stopped candidates are
//! surfaced as `ProviderError::ContentBlocked`.

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::provider::{Completion, Provider, Usage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::GenerationSettings;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A Gemini text provider.
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    model: String,
    settings: GenerationSettings,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("settings", &self.settings)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured("Gemini API key is required".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            model: model.into(),
            settings: GenerationSettings::default(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body<'a>(&self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                top_p: self.settings.top_p,
                top_k: self.settings.top_k,
                max_output_tokens: self.settings.max_output_tokens,
            },
        }
    }
}

/// Turn a successful `generateContent` body into a completion.
fn parse_response(model: &str, body: GenerateResponse) -> Result<Completion, ProviderError> {
    if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ProviderError::ContentBlocked(reason));
    }

    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate.finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST")) => {
                Err(ProviderError::ContentBlocked(reason.to_string()))
            }
            _ => Err(ProviderError::EmptyResponse),
        };
    }

    let usage = body.usage_metadata.map(|u| Usage {
        prompt_tokens: u.prompt_token_count,
        completion_tokens: u.candidates_token_count,
        total_tokens: u.total_token_count,
    });

    Ok(Completion {
        text,
        usage,
        model: body.model_version.unwrap_or_else(|| model.to_string()),
    })
}

/// Map an error status and body to a typed error.
///
/// The message keeps the backend's status and reason codes (`API_KEY_INVALID`,
/// `RESOURCE_EXHAUSTED`, ...) so marker-based classification still works.
fn map_error(status: u16, raw_body: &str) -> ProviderError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(raw_body).ok();
    let Some(ErrorEnvelope { error }) = parsed else {
        return match status {
            401 | 403 => ProviderError::AuthenticationFailed(raw_body.to_string()),
            429 => ProviderError::RateLimited(raw_body.to_string()),
            _ => ProviderError::ApiError {
                status_code: status,
                message: raw_body.to_string(),
            },
        };
    };

    let reasons: Vec<&str> = error
        .details
        .iter()
        .filter_map(|d| d.reason.as_deref())
        .collect();

    let mut message = match &error.status {
        Some(s) => format!("[{s}] {}", error.message),
        None => error.message.clone(),
    };
    if !reasons.is_empty() {
        message.push_str(&format!(" ({})", reasons.join(", ")));
    }

    if matches!(status, 401 | 403) || reasons.iter().any(|r| r.starts_with("API_KEY")) {
        ProviderError::AuthenticationFailed(message)
    } else if status == 429 || error.status.as_deref() == Some("RESOURCE_EXHAUSTED") {
        ProviderError::RateLimited(message)
    } else {
        ProviderError::ApiError {
            status_code: status,
            message,
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<Completion, ProviderError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Sending Gemini request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini returned error");
            return Err(map_error(status, &error_body));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        parse_response(&self.model, body)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Completion, ProviderError> {
        parse_response("gemini-1.5-flash", serde_json::from_str(json).unwrap())
    }

    #[test]
    fn empty_key_is_rejected() {
        let err = GeminiProvider::new("  ", "gemini-1.5-flash").unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn debug_redacts_key() {
        let provider = GeminiProvider::new("secret-key", "gemini-1.5-flash").unwrap();
        let debug = format!("{provider:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn endpoint_includes_model() {
        let provider = GeminiProvider::new("k", "gemini-1.5-flash")
            .unwrap()
            .with_base_url("http://localhost:9999/v1beta/");
        assert_eq!(
            provider.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn request_uses_camel_case_generation_config() {
        let provider = GeminiProvider::new("k", "gemini-1.5-flash").unwrap();
        let body = serde_json::to_value(provider.request_body("Hello")).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Hello");
        let config = &body["generationConfig"];
        assert_eq!(config["topK"], 40);
        assert_eq!(config["maxOutputTokens"], 1024);
        assert!((config["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!((config["topP"].as_f64().unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn parses_text_and_usage() {
        let completion = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"there!"}]},"finishReason":"STOP"}],
               "usageMetadata":{"promptTokenCount":12,"candidatesTokenCount":4,"totalTokenCount":16}}"#,
        )
        .unwrap();
        assert_eq!(completion.text, "Hello there!");
        let usage = completion.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.completion_tokens, 4);
        assert_eq!(usage.total_tokens, 16);
        assert_eq!(completion.model, "gemini-1.5-flash");
    }

    #[test]
    fn missing_usage_counts_default_to_zero() {
        let completion = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}],"usageMetadata":{"promptTokenCount":3}}"#,
        )
        .unwrap();
        let usage = completion.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.completion_tokens, 0);
    }

    #[test]
    fn blocked_prompt_is_content_blocked() {
        let err = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap_err();
        assert!(matches!(err, ProviderError::ContentBlocked(r) if r == "SAFETY"));
    }

    #[test]
    fn safety_finish_without_text_is_content_blocked() {
        let err = parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap_err();
        assert!(matches!(err, ProviderError::ContentBlocked(_)));
    }

    #[test]
    fn no_candidates_is_empty_response() {
        let err = parse(r#"{"candidates":[]}"#).unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[test]
    fn invalid_key_maps_to_authentication_failed() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.",
            "status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#;
        let err = map_error(400, body);
        match err {
            ProviderError::AuthenticationFailed(msg) => assert!(msg.contains("API_KEY_INVALID")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn quota_maps_to_rate_limited() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(map_error(429, body), ProviderError::RateLimited(_)));
    }

    #[test]
    fn unparseable_error_body_keeps_raw_text() {
        match map_error(502, "Bad Gateway") {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
