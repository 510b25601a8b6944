//! WhatsApp channel adapter.
//!
//! Pairing and the web-session transport live outside this process. A bridge
//! feeds raw message events in through [`WhatsAppChannel::inject_event`] and
//! the adapter normalizes them into `ChannelMessage`s. Outbound replies and
//! typing indicators are queued in a bounded outbox the bridge (or a test)
//! drains. When the bridge stops polling, the oldest entries are dropped.

use std::collections::VecDeque;

use async_trait::async_trait;
use parley_config::ChannelConfig;
use parley_core::channel::{Channel, ChannelId, ChannelMessage, MessageKind};
use parley_core::error::ChannelError;
use parley_core::message::ConversationKind;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

/// Outbox entries kept while the bridge is not polling.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// WhatsApp channel configuration.
#[derive(Clone)]
pub struct WhatsAppConfig {
    /// Session/client identifier used by the bridge for local auth.
    pub session_name: String,
    /// Allowed sender IDs. Empty = deny all, ["*"] = allow all.
    pub allowed_users: Vec<String>,
    /// Shared secret the bridge presents, if any.
    pub bridge_token: Option<String>,
    /// Maximum undrained outbox entries (at least 1).
    pub outbox_capacity: usize,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            session_name: "parley".into(),
            allowed_users: vec!["*".into()],
            bridge_token: None,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }
}

impl WhatsAppConfig {
    /// Build from a `[channels.whatsapp]` config section.
    ///
    /// An omitted `allowed_users` answers everyone.
    pub fn from_channel_config(config: &ChannelConfig) -> Self {
        let setting = |key: &str| {
            config
                .settings
                .get(key)
                .and_then(|v| v.as_str())
                .map(String::from)
        };
        let defaults = Self::default();
        Self {
            session_name: setting("session_name").unwrap_or(defaults.session_name),
            allowed_users: config
                .allowed_users
                .clone()
                .unwrap_or(defaults.allowed_users),
            bridge_token: setting("bridge_token"),
            outbox_capacity: config
                .settings
                .get("outbox_capacity")
                .and_then(|v| v.as_u64())
                .map_or(defaults.outbox_capacity, |n| n as usize)
                .max(1),
        }
    }
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("session_name", &self.session_name)
            .field("allowed_users", &self.allowed_users)
            .field(
                "bridge_token",
                &self.bridge_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("outbox_capacity", &self.outbox_capacity)
            .finish()
    }
}

/// Connection state of the WhatsApp client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientState {
    Disconnected,
    Ready,
}

impl ClientState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "not ready",
            Self::Ready => "ready",
        }
    }
}

/// A raw message event as the web client reports it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppEvent {
    #[serde(default)]
    pub id: String,
    /// Chat the message arrived in (`<number>@c.us` or `<id>@g.us`)
    pub from: String,
    /// Author inside a group chat
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub notify_name: Option<String>,
    #[serde(default)]
    pub chat_name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
}

impl WhatsAppEvent {
    /// Normalize into the platform-agnostic inbound message.
    pub fn into_message(self, channel_id: &ChannelId) -> ChannelMessage {
        let is_group = self.is_group || self.from.ends_with("@g.us");
        let sender_id = self.author.unwrap_or_else(|| self.from.clone());
        ChannelMessage {
            channel_id: channel_id.clone(),
            message_id: self.id,
            chat_id: self.from,
            chat_name: self.chat_name,
            chat_kind: if is_group {
                ConversationKind::Group
            } else {
                ConversationKind::Individual
            },
            sender_id: sender_id.split('@').next().unwrap_or_default().to_string(),
            sender_name: self.notify_name,
            from_self: self.from_me,
            kind: MessageKind::from_wire(&self.kind),
            content: self.body,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundKind {
    /// A text reply to deliver
    Message,
    /// Show "typing..." in the chat
    Typing,
}

/// Something the bridge should do in a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEvent {
    pub kind: OutboundKind,
    pub chat_id: String,
    /// Empty for typing indicators
    pub content: String,
    pub reply_to: Option<String>,
}

impl OutboundEvent {
    pub fn message(chat_id: &str, content: &str, reply_to: Option<&str>) -> Self {
        Self {
            kind: OutboundKind::Message,
            chat_id: chat_id.into(),
            content: content.into(),
            reply_to: reply_to.map(String::from),
        }
    }

    pub fn typing(chat_id: &str) -> Self {
        Self {
            kind: OutboundKind::Typing,
            chat_id: chat_id.into(),
            content: String::new(),
            reply_to: None,
        }
    }
}

/// WhatsApp channel adapter.
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    channel_id: ChannelId,
    state: Mutex<ClientState>,
    inject_tx: Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
    outbox: Mutex<VecDeque<OutboundEvent>>,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            channel_id: ChannelId("whatsapp".into()),
            state: Mutex::new(ClientState::Disconnected),
            inject_tx: Mutex::new(None),
            outbox: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn state(&self) -> ClientState {
        *self.state.lock().await
    }

    /// Inject a normalized message as if it came from WhatsApp.
    pub async fn inject_message(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(Ok(msg))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into()))
        } else {
            Err(ChannelError::ConnectionLost("Channel not started".into()))
        }
    }

    /// Inject a raw web-client event.
    pub async fn inject_event(&self, event: WhatsAppEvent) -> Result<(), ChannelError> {
        debug!(from = %event.from, kind = %event.kind, "WhatsApp event received");
        self.inject_message(event.into_message(&self.channel_id)).await
    }

    /// Parse and inject a JSON-encoded web-client event.
    pub async fn inject_json(&self, payload: &str) -> Result<(), ChannelError> {
        let event: WhatsAppEvent = serde_json::from_str(payload)
            .map_err(|e| ChannelError::InvalidPayload(e.to_string()))?;
        self.inject_event(event).await
    }

    /// Check the token a bridge presents. Always passes when no token is configured.
    pub fn verify_token(&self, presented: Option<&str>) -> bool {
        match &self.config.bridge_token {
            Some(expected) => presented == Some(expected.as_str()),
            None => true,
        }
    }

    /// Take every queued event since the last drain, oldest first.
    pub async fn drain_outbox(&self) -> Vec<OutboundEvent> {
        self.outbox.lock().await.drain(..).collect()
    }

    async fn ensure_ready(&self) -> Result<(), ChannelError> {
        if *self.state.lock().await != ClientState::Ready {
            return Err(ChannelError::DeliveryFailed {
                channel: "whatsapp".into(),
                reason: "client not ready".into(),
            });
        }
        Ok(())
    }

    async fn enqueue(&self, event: OutboundEvent) {
        let capacity = self.config.outbox_capacity.max(1);
        let mut outbox = self.outbox.lock().await;
        while outbox.len() >= capacity {
            let Some(dropped) = outbox.pop_front() else {
                break;
            };
            warn!(
                chat_id = %dropped.chat_id,
                kind = ?dropped.kind,
                capacity,
                "WhatsApp outbox full, dropping oldest entry"
            );
        }
        outbox.push_back(event);
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        info!(session = %self.config.session_name, "WhatsApp channel starting");
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        *self.state.lock().await = ClientState::Ready;
        info!("WhatsApp client is ready");
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        self.ensure_ready().await?;
        info!(
            chat_id = %chat_id,
            reply_to = ?reply_to,
            content_len = content.len(),
            "WhatsApp send"
        );
        self.enqueue(OutboundEvent::message(chat_id, content, reply_to))
            .await;
        Ok(())
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        self.ensure_ready().await?;
        debug!(chat_id = %chat_id, "WhatsApp typing");
        self.enqueue(OutboundEvent::typing(chat_id)).await;
        Ok(())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        if self.config.allowed_users.is_empty() {
            return false;
        }
        if self.config.allowed_users.iter().any(|u| u == "*") {
            return true;
        }
        self.config.allowed_users.iter().any(|u| u == sender_id)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("WhatsApp channel stopping");
        *self.inject_tx.lock().await = None;
        *self.state.lock().await = ClientState::Disconnected;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(self.state().await == ClientState::Ready)
    }
}
