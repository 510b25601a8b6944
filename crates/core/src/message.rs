//! Conversation and Turn domain types.
//!
//! These are the value objects that flow through the dispatcher:
//! Channel delivers a message → Dispatcher records a user `Turn` → Provider
//! answers → Dispatcher records an assistant `Turn`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker label used for every assistant turn.
pub const ASSISTANT_LABEL: &str = "AI Assistant";

/// Display name used when the transport cannot tell us who is talking.
pub const DEFAULT_DISPLAY_NAME: &str = "User";

/// Stable identifier for a conversation (the transport's chat id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl ConversationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a conversation is a one-to-one chat or a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    #[default]
    Individual,
    Group,
}

impl ConversationKind {
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group)
    }
}

impl std::fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Individual => write!(f, "individual"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person chatting with the bot
    User,
    /// The AI backend
    Assistant,
}

/// One labeled message in a conversation's rolling history.
///
/// Turns are immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored this turn
    pub role: Role,

    /// Label shown in the prompt transcript (display name or assistant label)
    pub speaker: String,

    /// The message content
    pub text: String,

    /// When the turn was recorded
    pub occurred_at: DateTime<Utc>,
}

impl Turn {
    /// Create a user turn labeled with the conversation's display name.
    pub fn user(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            speaker: speaker.into(),
            text: text.into(),
            occurred_at: Utc::now(),
        }
    }

    /// Create an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            speaker: ASSISTANT_LABEL.into(),
            text: text.into(),
            occurred_at: Utc::now(),
        }
    }
}
