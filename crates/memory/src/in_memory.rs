//! In-memory context store - one rolling history per conversation, lost on restart.

use async_trait::async_trait;
use parley_core::context::{
    ContextProfile, ContextStore, ConversationContext, DEFAULT_MAX_HISTORY,
};
use parley_core::error::MemoryError;
use parley_core::message::{ConversationId, Turn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A context store backed by a `HashMap` behind an async `RwLock`.
///
/// Every operation takes the lock once, so appends and clears are atomic with
/// respect to each other.
pub struct InMemoryContextStore {
    contexts: Arc<RwLock<HashMap<ConversationId, ConversationContext>>>,
    max_history: usize,
}

impl InMemoryContextStore {
    /// Create a store that keeps at most `max_history` turns per conversation.
    pub fn new(max_history: usize) -> Self {
        Self {
            contexts: Arc::new(RwLock::new(HashMap::new())),
            max_history: max_history.max(1),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    async fn append(
        &self,
        id: &ConversationId,
        make_turn: impl FnOnce(&ConversationContext) -> Turn,
    ) -> Option<ConversationContext> {
        let mut contexts = self.contexts.write().await;
        let Some(ctx) = contexts.get_mut(id) else {
            debug!(chat_id = %id, "Append to unknown conversation dropped");
            return None;
        };
        let turn = make_turn(ctx);
        ctx.push(turn, self.max_history);
        Some(ctx.clone())
    }
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(
        &self,
        id: &ConversationId,
        profile: &ContextProfile,
    ) -> Result<ConversationContext, MemoryError> {
        let mut contexts = self.contexts.write().await;
        let ctx = contexts.entry(id.clone()).or_insert_with(|| {
            debug!(chat_id = %id, "Creating conversation context");
            ConversationContext::new(id.clone(), profile)
        });
        Ok(ctx.clone())
    }

    async fn peek(&self, id: &ConversationId) -> Result<Option<ConversationContext>, MemoryError> {
        Ok(self.contexts.read().await.get(id).cloned())
    }

    async fn append_user(
        &self,
        id: &ConversationId,
        text: &str,
    ) -> Result<Option<ConversationContext>, MemoryError> {
        Ok(self
            .append(id, |ctx| Turn::user(ctx.display_name.clone(), text))
            .await)
    }

    async fn append_assistant(
        &self,
        id: &ConversationId,
        text: &str,
    ) -> Result<Option<ConversationContext>, MemoryError> {
        Ok(self.append(id, |_| Turn::assistant(text)).await)
    }

    async fn clear(&self, id: &ConversationId) -> Result<bool, MemoryError> {
        Ok(self.contexts.write().await.remove(id).is_some())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.contexts.read().await.len())
    }
}
