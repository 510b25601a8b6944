//! Conversation context - the rolling, bounded memory of one chat.
//!
//! A `ConversationContext` keeps the last few turns of a conversation plus the
//! metadata used to label them. The `ContextStore` trait owns the contexts of
//! every conversation the process has seen.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::message::{ConversationId, ConversationKind, DEFAULT_DISPLAY_NAME, Turn};

/// Default number of turns retained per conversation.
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// Caller-supplied metadata used only when a context is first created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextProfile {
    /// Human-readable name of the person chatting, if the transport knows it
    pub display_name: Option<String>,

    /// Individual or group chat
    pub kind: ConversationKind,
}

/// Rolling history and metadata for a single conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    /// The conversation this context belongs to
    pub id: ConversationId,

    /// Label for the user's turns
    pub display_name: String,

    /// Individual or group chat
    pub kind: ConversationKind,

    /// Ordered turns, oldest first
    pub history: Vec<Turn>,

    /// When this context was created
    pub created_at: DateTime<Utc>,
}

impl ConversationContext {
    /// Create an empty context from a creation profile.
    pub fn new(id: ConversationId, profile: &ContextProfile) -> Self {
        let display_name = profile
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME)
            .to_string();

        Self {
            id,
            display_name,
            kind: profile.kind,
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append a turn, then drop the oldest turns until at most `max_history` remain.
    pub fn push(&mut self, turn: Turn, max_history: usize) {
        self.history.push(turn);
        if self.history.len() > max_history {
            let excess = self.history.len() - max_history;
            self.history.drain(..excess);
        }
    }

    /// The `n` most recent turns, in chronological order.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }
}

/// The core ContextStore trait.
///
/// Implementations must make every call atomic: a reader never observes a
/// half-applied append. Returned contexts are snapshots; mutating them does not
/// touch the store.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Return the context for `id`, creating an empty one from `profile` if absent.
    async fn get(
        &self,
        id: &ConversationId,
        profile: &ContextProfile,
    ) -> std::result::Result<ConversationContext, MemoryError>;

    /// Look up a context without creating it.
    async fn peek(
        &self,
        id: &ConversationId,
    ) -> std::result::Result<Option<ConversationContext>, MemoryError>;

    /// Append a user turn. Returns the updated snapshot, or `None` if the
    /// conversation does not exist.
    async fn append_user(
        &self,
        id: &ConversationId,
        text: &str,
    ) -> std::result::Result<Option<ConversationContext>, MemoryError>;

    /// Append an assistant turn. Returns the updated snapshot, or `None` if the
    /// conversation does not exist.
    async fn append_assistant(
        &self,
        id: &ConversationId,
        text: &str,
    ) -> std::result::Result<Option<ConversationContext>, MemoryError>;

    /// Delete a conversation's context. Returns whether one existed.
    async fn clear(&self, id: &ConversationId) -> std::result::Result<bool, MemoryError>;

    /// Number of live conversations.
    async fn count(&self) -> std::result::Result<usize, MemoryError>;
}
