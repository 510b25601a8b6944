//! Channel trait - the abstraction over chat platforms.
//!
//! A Channel connects Parley to a messaging platform (WhatsApp, terminal, etc.).
//! It receives messages from users and sends replies back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;
use crate::message::{ConversationId, ConversationKind};

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of content an inbound message carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    #[serde(alias = "chat")]
    Text,
    Image,
    Document,
    Audio,
    /// Push-to-talk voice note
    #[serde(alias = "ptt")]
    Voice,
    Video,
    /// Stickers, locations, contacts, ...
    #[serde(other)]
    Other,
}

impl MessageKind {
    /// Parse a platform message-type string (`chat`, `ptt`, `image`, ...).
    pub fn from_wire(kind: &str) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "chat" | "text" => Self::Text,
            "image" => Self::Image,
            "document" => Self::Document,
            "audio" => Self::Audio,
            "ptt" | "voice" => Self::Voice,
            "video" => Self::Video,
            _ => Self::Other,
        }
    }

    /// The media category used for acknowledgments, if this is a media message.
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            Self::Image => Some(MediaKind::Image),
            Self::Document => Some(MediaKind::Document),
            Self::Audio | Self::Voice => Some(MediaKind::Audio),
            Self::Video => Some(MediaKind::Video),
            Self::Text | Self::Other => None,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Document => "document",
            Self::Audio => "audio",
            Self::Voice => "voice",
            Self::Video => "video",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Media categories the dispatcher acknowledges instead of forwarding to the AI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Document,
    Audio,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Audio => "audio",
            Self::Video => "video",
        };
        f.write_str(name)
    }
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// Platform message id (used to thread the reply)
    pub message_id: String,

    /// The chat/group/DM identifier within the channel
    pub chat_id: String,

    /// Human-readable chat title (group subject or contact name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_name: Option<String>,

    /// Individual or group chat
    #[serde(default)]
    pub chat_kind: ConversationKind,

    /// Sender identifier (platform-specific user ID or phone number)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// Whether the bot's own account sent this message
    #[serde(default)]
    pub from_self: bool,

    /// Content type
    #[serde(default)]
    pub kind: MessageKind,

    /// The text content (caption for media)
    #[serde(default)]
    pub content: String,
}

impl ChannelMessage {
    /// Create a plain text message with sensible defaults for the remaining fields.
    pub fn text(
        channel: &str,
        chat_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: ChannelId(channel.into()),
            message_id: String::new(),
            chat_id: chat_id.into(),
            chat_name: None,
            chat_kind: ConversationKind::Individual,
            sender_id: sender_id.into(),
            sender_name: None,
            from_self: false,
            kind: MessageKind::Text,
            content: content.into(),
        }
    }

    /// The conversation key for this message.
    pub fn conversation_id(&self) -> ConversationId {
        ConversationId(self.chat_id.clone())
    }

    /// The id to reply to, if the platform supplied one.
    pub fn reply_to(&self) -> Option<&str> {
        if self.message_id.is_empty() {
            None
        } else {
            Some(&self.message_id)
        }
    }
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, message formatting,
/// and authentication.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "whatsapp", "cli").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for incoming messages.
    ///
    /// Returns a receiver that yields incoming messages. The channel
    /// implementation handles polling, webhooks, or websocket connections
    /// internally.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;

    /// Send a reply to a specific chat.
    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> std::result::Result<(), ChannelError>;

    /// Send a typing indicator (if the platform supports it).
    async fn send_typing(&self, _chat_id: &str) -> std::result::Result<(), ChannelError> {
        Ok(()) // No-op default
    }

    /// Check if a sender is allowed (allowlist check).
    fn is_allowed(&self, sender_id: &str) -> bool;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check - is the channel connected and operational?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}
