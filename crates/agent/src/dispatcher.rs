//! The message dispatcher - decides and sends exactly one reply per message.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parley_config::AppConfig;
use parley_core::channel::{Channel, ChannelMessage, MediaKind, MessageKind};
use parley_core::context::{ContextProfile, ContextStore};
use parley_core::error::MemoryError;
use parley_core::message::{ConversationId, DEFAULT_DISPLAY_NAME};
use parley_memory::InMemoryContextStore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::commands::CommandRouter;
use crate::failure::GenerationOutcome;
use crate::gateway::AiGateway;
use crate::prompt::{DEFAULT_PERSONA, PromptAssembler, PromptMetadata};
use crate::stats::RuntimeStats;

pub const UNEXPECTED_ERROR_REPLY: &str = "❌ Sorry, there was an unexpected error.";
pub const AI_DISABLED_REPLY: &str =
    "🤖 AI service is currently disabled. Please configure your AI API key.";

/// Reply to a media message when no AI backend is configured.
pub fn disabled_notice(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "📸 Nice image! Unfortunately, AI features are currently disabled.",
        MediaKind::Document => "📄 Thanks for the document! AI analysis is currently unavailable.",
        MediaKind::Audio => "🎵 Got your audio message! AI features are currently disabled.",
        MediaKind::Video => "🎥 Thanks for the video! AI analysis is currently unavailable.",
    }
}

pub struct MessageDispatcher {
    store: Arc<dyn ContextStore>,
    gateway: Option<AiGateway>,
    assembler: PromptAssembler,
    router: CommandRouter,
    stats: Arc<RuntimeStats>,
    ignored_senders: Vec<String>,
    default_display_name: String,
}

impl MessageDispatcher {
    /// Create a dispatcher. `gateway: None` runs with AI features disabled.
    pub fn new(store: Arc<dyn ContextStore>, gateway: Option<AiGateway>) -> Self {
        let stats = Arc::new(RuntimeStats::new());
        let router = CommandRouter::new(store.clone(), stats.clone(), gateway.is_some());
        Self {
            store,
            gateway,
            assembler: PromptAssembler::default(),
            router,
            stats,
            ignored_senders: vec!["status@broadcast".into()],
            default_display_name: DEFAULT_DISPLAY_NAME.into(),
        }
    }

    /// Wire up the configured backend and an in-memory context store.
    pub fn from_config(config: &AppConfig) -> Result<Self, parley_core::Error> {
        let provider = parley_providers::build_from_config(config)?;
        let gateway = provider.map(|p| AiGateway::from_config(p, config));
        let store = Arc::new(InMemoryContextStore::new(config.conversation.max_history));

        let persona = config
            .conversation
            .persona
            .as_deref()
            .unwrap_or(DEFAULT_PERSONA);

        Ok(Self::new(store, gateway)
            .with_assembler(PromptAssembler::new(
                persona,
                config.conversation.context_window,
            ))
            .with_ignored_senders(config.dispatch.ignored_senders.clone())
            .with_default_display_name(&config.conversation.default_display_name))
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_ignored_senders(mut self, senders: Vec<String>) -> Self {
        self.ignored_senders = senders;
        self
    }

    pub fn with_default_display_name(mut self, name: &str) -> Self {
        self.default_display_name = name.to_string();
        self
    }

    pub fn ai_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    pub fn gateway(&self) -> Option<&AiGateway> {
        self.gateway.as_ref()
    }

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.store
    }

    pub fn stats(&self) -> &Arc<RuntimeStats> {
        &self.stats
    }

    /// Drop a conversation's context. Returns whether one existed.
    pub async fn clear(&self, id: &ConversationId) -> Result<bool, MemoryError> {
        self.store.clear(id).await
    }

    /// Decide and send the reply to `msg`. Returns what was sent.
    ///
    /// Transport failures are logged and otherwise ignored.
    pub async fn dispatch(&self, channel: &dyn Channel, msg: &ChannelMessage) -> Option<String> {
        let reply = self.respond(channel, msg).await?;
        if let Err(e) = channel.send(&msg.chat_id, &reply, msg.reply_to()).await {
            error!(
                chat_id = %msg.chat_id,
                channel = %channel.name(),
                error = %e,
                "Failed to send reply"
            );
        }
        Some(reply)
    }

    /// Run `dispatch` on its own task.
    pub fn spawn_dispatch(
        self: &Arc<Self>,
        channel: Arc<dyn Channel>,
        msg: ChannelMessage,
    ) -> JoinHandle<Option<String>> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.dispatch(channel.as_ref(), &msg).await })
    }

    /// Decide the reply to `msg` without sending it.
    ///
    /// `None` means the message is ignored. Errors and panics while deciding
    /// become a single generic error reply.
    pub async fn respond(&self, channel: &dyn Channel, msg: &ChannelMessage) -> Option<String> {
        if self.is_ignored(channel, msg) {
            debug!(chat_id = %msg.chat_id, sender = %msg.sender_id, "Ignoring message");
            return None;
        }

        match AssertUnwindSafe(self.decide(channel, msg)).catch_unwind().await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                error!(chat_id = %msg.chat_id, error = %e, "Error handling message");
                Some(UNEXPECTED_ERROR_REPLY.to_string())
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                error!(chat_id = %msg.chat_id, panic = %detail, "Panic while handling message");
                Some(UNEXPECTED_ERROR_REPLY.to_string())
            }
        }
    }

    fn is_ignored(&self, channel: &dyn Channel, msg: &ChannelMessage) -> bool {
        msg.from_self
            || self
                .ignored_senders
                .iter()
                .any(|s| *s == msg.chat_id || *s == msg.sender_id)
            || !channel.is_allowed(&msg.sender_id)
    }

    async fn decide(
        &self,
        channel: &dyn Channel,
        msg: &ChannelMessage,
    ) -> Result<Option<String>, parley_core::Error> {
        debug!(chat_id = %msg.chat_id, kind = %msg.kind, "Handling message");

        if let Some(reply) = self.router.route(msg, channel).await? {
            self.stats.record_message();
            return Ok(Some(reply));
        }

        if let Some(media) = msg.kind.media_kind() {
            self.stats.record_message();
            let reply = match &self.gateway {
                Some(gateway) => gateway.generate_acknowledgment(media).await,
                None => disabled_notice(media).to_string(),
            };
            return Ok(Some(reply));
        }

        if msg.kind != MessageKind::Text || msg.content.trim().is_empty() {
            debug!(chat_id = %msg.chat_id, kind = %msg.kind, "Nothing to answer");
            return Ok(None);
        }

        self.stats.record_message();
        let Some(gateway) = &self.gateway else {
            return Ok(Some(AI_DISABLED_REPLY.to_string()));
        };

        self.answer_text(gateway, channel, msg).await.map(Some)
    }

    async fn answer_text(
        &self,
        gateway: &AiGateway,
        channel: &dyn Channel,
        msg: &ChannelMessage,
    ) -> Result<String, parley_core::Error> {
        if let Err(e) = channel.send_typing(&msg.chat_id).await {
            debug!(chat_id = %msg.chat_id, error = %e, "Typing indicator failed");
        }

        let id = msg.conversation_id();
        let profile = ContextProfile {
            display_name: Some(
                msg.sender_name
                    .clone()
                    .unwrap_or_else(|| self.default_display_name.clone()),
            ),
            kind: msg.chat_kind,
        };

        let created = self.store.get(&id, &profile).await?;
        let ctx = self
            .store
            .append_user(&id, &msg.content)
            .await?
            .unwrap_or(created);

        let request = self.assembler.assemble(
            PromptMetadata::from(&ctx),
            &ctx.history,
            &msg.content,
        );

        match gateway.generate(&request).await {
            GenerationOutcome::Success { text, usage } => {
                if self.store.append_assistant(&id, &text).await?.is_none() {
                    debug!(chat_id = %id, "Conversation cleared during generation");
                }
                info!(
                    chat_id = %id,
                    total_tokens = usage.total,
                    response_len = text.len(),
                    "AI reply sent"
                );
                Ok(text)
            }
            GenerationOutcome::Failure {
                kind,
                message,
                fallback_text,
            } => {
                warn!(chat_id = %id, %kind, %message, "AI generation failed");
                Ok(fallback_text)
            }
        }
    }
}
