//! Generation outcomes and backend failure classification.
//!
//! Every backend error is mapped to one of four [`FailureKind`]s by an ordered
//! rule table. The first matching rule wins, so credential problems take
//! priority over quota problems, which take priority over safety blocks.

use parley_config::FailureMarkersConfig;
use parley_core::error::ProviderError;
use parley_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Reply sent when the backend fails for a reason we cannot name.
pub const UNKNOWN_FALLBACK: &str =
    "😅 Sorry, I'm having trouble processing that right now. Please try again!";

/// Category of a failed generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    InvalidCredentials,
    QuotaExceeded,
    SafetyBlocked,
    Unknown,
}

impl FailureKind {
    /// User-facing reply for this kind of failure.
    pub fn fallback_text(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => {
                "❌ Sorry, there's an issue with the AI service configuration."
            }
            Self::QuotaExceeded => "⚠️ AI service is temporarily unavailable due to quota limits.",
            Self::SafetyBlocked => "🚫 Sorry, I cannot respond to that type of content.",
            Self::Unknown => UNKNOWN_FALLBACK,
        }
    }

    /// Operator-facing description. `Unknown` keeps the raw backend text instead.
    pub fn description(&self) -> Option<&'static str> {
        match self {
            Self::InvalidCredentials => {
                Some("Invalid API key. Please check your AI service configuration.")
            }
            Self::QuotaExceeded => Some("API quota exceeded."),
            Self::SafetyBlocked => Some("Content filtered by safety settings."),
            Self::Unknown => None,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::QuotaExceeded => "quota_exceeded",
            Self::SafetyBlocked => "safety_blocked",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Token accounting for a successful generation. Missing counters are 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u32,
    pub completion: u32,
    pub total: u32,
}

impl From<Option<Usage>> for TokenUsage {
    fn from(usage: Option<Usage>) -> Self {
        let usage = usage.unwrap_or_default();
        Self {
            prompt: usage.prompt_tokens,
            completion: usage.completion_tokens,
            total: usage.total_tokens,
        }
    }
}

/// Result of one generation attempt. Never an `Err`: failures carry their
/// own fallback reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Success {
        text: String,
        usage: TokenUsage,
    },
    Failure {
        kind: FailureKind,
        message: String,
        fallback_text: String,
    },
}

impl GenerationOutcome {
    /// Build a failure, filling the message and fallback from the kind.
    pub fn failure(kind: FailureKind, raw_message: impl Into<String>) -> Self {
        let message = match kind.description() {
            Some(description) => description.to_string(),
            None => raw_message.into(),
        };
        Self::Failure {
            kind,
            message,
            fallback_text: kind.fallback_text().to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The text to send back to the user.
    pub fn reply_text(&self) -> &str {
        match self {
            Self::Success { text, .. } => text,
            Self::Failure { fallback_text, .. } => fallback_text,
        }
    }
}

type Predicate = Box<dyn Fn(&ProviderError, &str) -> bool + Send + Sync>;

struct Rule {
    kind: FailureKind,
    matches: Predicate,
}

/// Ordered `(predicate, kind)` table. Anything unmatched is `Unknown`.
pub struct FailureClassifier {
    rules: Vec<Rule>,
}

impl std::fmt::Debug for FailureClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureClassifier")
            .field("rules", &self.rules.iter().map(|r| r.kind).collect::<Vec<_>>())
            .finish()
    }
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::from_markers(&FailureMarkersConfig::default())
    }
}

fn contains_any(markers: Vec<String>) -> impl Fn(&str) -> bool + Send + Sync {
    move |text| markers.iter().any(|m| !m.is_empty() && text.contains(m.as_str()))
}

impl FailureClassifier {
    /// Build the default table from configured marker strings.
    ///
    /// Typed provider errors match regardless of their text.
    pub fn from_markers(markers: &FailureMarkersConfig) -> Self {
        let credential = contains_any(markers.credential_markers.clone());
        let quota = contains_any(markers.quota_markers.clone());
        let safety = contains_any(markers.safety_markers.clone());

        Self {
            rules: vec![
                Rule {
                    kind: FailureKind::InvalidCredentials,
                    matches: Box::new(move |err, text| {
                        matches!(err, ProviderError::AuthenticationFailed(_)) || credential(text)
                    }),
                },
                Rule {
                    kind: FailureKind::QuotaExceeded,
                    matches: Box::new(move |err, text| {
                        matches!(err, ProviderError::RateLimited(_)) || quota(text)
                    }),
                },
                Rule {
                    kind: FailureKind::SafetyBlocked,
                    matches: Box::new(move |err, text| {
                        matches!(err, ProviderError::ContentBlocked(_)) || safety(text)
                    }),
                },
            ],
        }
    }

    /// Append a custom rule after the built-in ones.
    pub fn with_rule(
        mut self,
        kind: FailureKind,
        predicate: impl Fn(&ProviderError, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(Rule {
            kind,
            matches: Box::new(predicate),
        });
        self
    }

    /// Classify a backend error.
    pub fn classify(&self, error: &ProviderError) -> FailureKind {
        let text = error.to_string();
        self.rules
            .iter()
            .find(|rule| (rule.matches)(error, &text))
            .map(|rule| rule.kind)
            .unwrap_or(FailureKind::Unknown)
    }

    /// Classify a backend error into a complete outcome.
    pub fn outcome(&self, error: &ProviderError) -> GenerationOutcome {
        GenerationOutcome::failure(self.classify(error), error.to_string())
    }
}
