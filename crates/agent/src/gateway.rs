//! AI Gateway - wraps a `Provider` and turns its results into typed outcomes.
//!
//! Three operations, none of which ever returns a `ProviderError`:
//! - [`AiGateway::generate`] answers a conversation turn
//! - [`AiGateway::generate_acknowledgment`] is a best-effort reply to media
//! - [`AiGateway::classify`] asks the model for a sentiment/intent verdict

use std::sync::Arc;
use std::time::Duration;

use parley_config::AppConfig;
use parley_core::channel::MediaKind;
use parley_core::error::ProviderError;
use parley_core::provider::{Completion, Provider};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::failure::{FailureClassifier, FailureKind, GenerationOutcome, TokenUsage};
use crate::prompt::GenerationRequest;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reply used whenever a media acknowledgment cannot be generated.
pub const ACK_FALLBACK: &str = "👋 Thanks for sharing! How can I help you today?";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Question,
    Request,
    Greeting,
    Complaint,
    #[default]
    Other,
}

/// The model's verdict on a single message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MessageAnalysis {
    pub sentiment: Sentiment,
    pub intent: Intent,
    pub confidence: f32,
}

impl MessageAnalysis {
    fn fallback(confidence: f32) -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            intent: Intent::Other,
            confidence,
        }
    }

    /// Parse a JSON verdict, tolerating a surrounding code fence.
    ///
    /// Returns neutral/other/0.5 when the text is not a valid verdict.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<MessageAnalysis>(strip_code_fence(text)) {
            Ok(mut analysis) => {
                analysis.confidence = analysis.confidence.clamp(0.0, 1.0);
                analysis
            }
            Err(e) => {
                debug!(error = %e, "Analysis response was not valid JSON");
                Self::fallback(0.5)
            }
        }
    }
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` fence and its closing fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn acknowledgment_prompt(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => {
            "The user sent an image. Generate a friendly response acknowledging the image and asking if they need help with anything related to it."
        }
        MediaKind::Document => {
            "The user sent a document. Generate a helpful response offering to help them with document-related questions."
        }
        MediaKind::Audio => {
            "The user sent an audio message. Generate a friendly response acknowledging the audio and offering assistance."
        }
        MediaKind::Video => {
            "The user sent a video. Generate an engaging response about the video and offer help if needed."
        }
    }
}

fn analysis_prompt(message: &str) -> String {
    format!(
        r#"Analyze this message and return a JSON object with sentiment (positive/negative/neutral) and intent (question/request/greeting/complaint/other):

Message: "{message}"

Return only valid JSON in this format:
{{
  "sentiment": "positive|negative|neutral",
  "intent": "question|request|greeting|complaint|other",
  "confidence": 0.0-1.0
}}"#
    )
}

/// The single entry point to the generation backend.
pub struct AiGateway {
    provider: Arc<dyn Provider>,
    classifier: FailureClassifier,
    timeout: Duration,
}

impl AiGateway {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            classifier: FailureClassifier::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build a gateway using the timeout and failure markers from config.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self::new(provider)
            .with_classifier(FailureClassifier::from_markers(&config.failures))
            .with_timeout(Duration::from_secs(config.provider.timeout_secs))
    }

    pub fn with_classifier(mut self, classifier: FailureClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn health_check(&self) -> bool {
        self.provider.health_check().await.unwrap_or(false)
    }

    async fn invoke(&self, prompt: &str) -> Result<Completion, ProviderError> {
        match tokio::time::timeout(self.timeout, self.provider.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "no response after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    /// Answer one conversation turn.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let prompt = request.render();
        debug!(provider = %self.provider.name(), prompt_len = prompt.len(), "Generating reply");

        let completion = match self.invoke(&prompt).await {
            Ok(completion) => completion,
            Err(ProviderError::Timeout(message)) => {
                warn!(provider = %self.provider.name(), %message, "Generation timed out");
                return GenerationOutcome::failure(FailureKind::Unknown, message);
            }
            Err(e) => {
                let outcome = self.classifier.outcome(&e);
                warn!(
                    provider = %self.provider.name(),
                    kind = %self.classifier.classify(&e),
                    error = %e,
                    "Generation failed"
                );
                return outcome;
            }
        };

        let text = completion.text.trim();
        if text.is_empty() {
            warn!(provider = %self.provider.name(), "Backend returned an empty reply");
            return GenerationOutcome::failure(
                FailureKind::Unknown,
                ProviderError::EmptyResponse.to_string(),
            );
        }

        let usage = TokenUsage::from(completion.usage);
        info!(
            model = %completion.model,
            prompt_tokens = usage.prompt,
            completion_tokens = usage.completion,
            total_tokens = usage.total,
            response_len = text.len(),
            "Reply generated"
        );

        GenerationOutcome::Success {
            text: text.to_string(),
            usage,
        }
    }

    /// A short friendly reply to a media message. Never fails.
    pub async fn generate_acknowledgment(&self, kind: MediaKind) -> String {
        match self.invoke(acknowledgment_prompt(kind)).await {
            Ok(completion) if !completion.text.trim().is_empty() => {
                completion.text.trim().to_string()
            }
            Ok(_) => {
                debug!(%kind, "Empty acknowledgment, using fallback");
                ACK_FALLBACK.to_string()
            }
            Err(e) => {
                warn!(%kind, error = %e, "Acknowledgment generation failed");
                ACK_FALLBACK.to_string()
            }
        }
    }

    /// Ask the model for a sentiment/intent verdict on `text`.
    ///
    /// Backend failures yield neutral/other with confidence 0.0.
    pub async fn classify(&self, text: &str) -> MessageAnalysis {
        match self.invoke(&analysis_prompt(text)).await {
            Ok(completion) => MessageAnalysis::parse(&completion.text),
            Err(e) => {
                warn!(error = %e, "Message analysis failed");
                MessageAnalysis::fallback(0.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{PromptAssembler, PromptMetadata};
    use crate::test_helpers::{HangingProvider, ScriptedProvider, completion};

    fn request(text: &str) -> GenerationRequest {
        PromptAssembler::default().assemble(PromptMetadata::default(), &[], text)
    }

    #[tokio::test]
    async fn success_is_trimmed() {
        let gateway = AiGateway::new(Arc::new(ScriptedProvider::text("  Hi there! 👋 \n")));
        let outcome = gateway.generate(&request("Hello")).await;
        assert_eq!(
            outcome,
            GenerationOutcome::Success {
                text: "Hi there! 👋".into(),
                usage: TokenUsage {
                    prompt: 10,
                    completion: 5,
                    total: 15
                },
            }
        );
    }

    #[tokio::test]
    async fn missing_usage_is_zero() {
        let provider = ScriptedProvider::new(vec![Ok(Completion {
            text: "ok".into(),
            usage: None,
            model: "m".into(),
        })]);
        let gateway = AiGateway::new(Arc::new(provider));
        match gateway.generate(&request("Hello")).await {
            GenerationOutcome::Success { usage, .. } => assert_eq!(usage, TokenUsage::default()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn whitespace_reply_is_unknown_failure() {
        let gateway = AiGateway::new(Arc::new(ScriptedProvider::text("   ")));
        match gateway.generate(&request("Hello")).await {
            GenerationOutcome::Failure { kind, .. } => assert_eq!(kind, FailureKind::Unknown),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn backend_errors_are_classified() {
        let gateway = AiGateway::new(Arc::new(ScriptedProvider::failing(
            ProviderError::ApiError {
                status_code: 429,
                message: "QUOTA_EXCEEDED".into(),
            },
        )));
        let outcome = gateway.generate(&request("Hello")).await;
        assert_eq!(
            outcome.reply_text(),
            "⚠️ AI service is temporarily unavailable due to quota limits."
        );
    }

    #[tokio::test]
    async fn prompt_is_rendered_request() {
        let provider = Arc::new(ScriptedProvider::text("ok"));
        let gateway = AiGateway::new(provider.clone());
        let req = request("Hello");
        gateway.generate(&req).await;
        assert_eq!(provider.prompts(), vec![req.render()]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_unknown_failure() {
        let gateway =
            AiGateway::new(Arc::new(HangingProvider)).with_timeout(Duration::from_secs(5));
        match gateway.generate(&request("Hello")).await {
            GenerationOutcome::Failure { kind, message, .. } => {
                assert_eq!(kind, FailureKind::Unknown);
                assert!(message.contains("5s"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn acknowledgment_uses_kind_prompt() {
        let provider = Arc::new(ScriptedProvider::text(" Nice picture! "));
        let gateway = AiGateway::new(provider.clone());
        let ack = gateway.generate_acknowledgment(MediaKind::Image).await;
        assert_eq!(ack, "Nice picture!");
        assert!(provider.prompts()[0].contains("sent an image"));
    }

    #[tokio::test]
    async fn acknowledgment_falls_back() {
        let gateway = AiGateway::new(Arc::new(ScriptedProvider::failing(
            ProviderError::Network("down".into()),
        )));
        assert_eq!(
            gateway.generate_acknowledgment(MediaKind::Video).await,
            ACK_FALLBACK
        );

        let gateway = AiGateway::new(Arc::new(ScriptedProvider::text("")));
        assert_eq!(
            gateway.generate_acknowledgment(MediaKind::Audio).await,
            ACK_FALLBACK
        );
    }

    #[tokio::test]
    async fn classify_parses_fenced_json() {
        let provider = ScriptedProvider::new(vec![Ok(completion(
            "```json\n{\"sentiment\":\"positive\",\"intent\":\"greeting\",\"confidence\":0.92}\n```",
        ))]);
        let gateway = AiGateway::new(Arc::new(provider));
        let analysis = gateway.classify("Hi!").await;
        assert_eq!(analysis.sentiment, Sentiment::Positive);
        assert_eq!(analysis.intent, Intent::Greeting);
        assert!((analysis.confidence - 0.92).abs() < 1e-6);
    }

    #[tokio::test]
    async fn classify_unparseable_is_half_confident() {
        let gateway = AiGateway::new(Arc::new(ScriptedProvider::text("I think it's happy")));
        let analysis = gateway.classify("Hi!").await;
        assert_eq!(analysis, MessageAnalysis::fallback(0.5));
    }

    #[tokio::test]
    async fn classify_backend_failure_is_zero_confidence() {
        let gateway = AiGateway::new(Arc::new(ScriptedProvider::failing(
            ProviderError::EmptyResponse,
        )));
        let analysis = gateway.classify("Hi!").await;
        assert_eq!(analysis.sentiment, Sentiment::Neutral);
        assert_eq!(analysis.intent, Intent::Other);
        assert_eq!(analysis.confidence, 0.0);
    }

    #[test]
    fn code_fence_stripping() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
    }

    #[test]
    fn confidence_is_clamped() {
        let analysis =
            MessageAnalysis::parse(r#"{"sentiment":"negative","intent":"complaint","confidence":7}"#);
        assert_eq!(analysis.confidence, 1.0);
        assert_eq!(analysis.intent, Intent::Complaint);
    }
}
