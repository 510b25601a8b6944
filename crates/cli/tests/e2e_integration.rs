//! End-to-end integration tests for the Parley chatbot.
//!
//! These tests drive whole messages through the dispatcher, from an inbound
//! chat message to the reply a channel sends, with a scripted backend in
//! place of the real AI service.

use std::sync::{Arc, Mutex};

use parley_agent::failure::UNKNOWN_FALLBACK;
use parley_agent::gateway::ACK_FALLBACK;
use parley_agent::{AiGateway, FailureKind, MessageDispatcher};
use parley_agent::commands::{CLEARED_REPLY, PONG_REPLY};
use parley_channels::{
    ChannelRegistry, OutboundEvent, OutboundKind, WhatsAppChannel, WhatsAppConfig,
};
use parley_config::AppConfig;
use parley_core::channel::{Channel, ChannelId, ChannelMessage, MessageKind};
use parley_core::context::{ContextProfile, ContextStore};
use parley_core::error::{ChannelError, ProviderError};
use parley_core::message::{ConversationId, Role};
use parley_core::provider::{Completion, Provider, Usage};
use parley_memory::InMemoryContextStore;
use tokio::sync::mpsc;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted results in sequence.
struct ScriptedProvider {
    results: Mutex<Vec<Result<Completion, ProviderError>>>,
    call_count: Mutex<usize>,
}

impl ScriptedProvider {
    fn new(results: Vec<Result<Completion, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results),
            call_count: Mutex::new(0),
        }
    }

    fn text(response: &str) -> Self {
        Self::new(vec![Ok(text_response(response))])
    }

    fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn generate(&self, _prompt: &str) -> Result<Completion, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let mut results = self.results.lock().unwrap();
        if results.is_empty() {
            panic!("ScriptedProvider exhausted: call #{}", *count);
        }
        *count += 1;
        results.remove(0)
    }
}

fn text_response(text: &str) -> Completion {
    Completion {
        text: text.into(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

// ── Mock Channel ─────────────────────────────────────────────────────────

/// A channel that records every reply instead of delivering it.
struct RecordingChannel {
    id: ChannelId,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingChannel {
    fn new() -> Self {
        Self {
            id: ChannelId("recording".into()),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn replies(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }
}

#[async_trait::async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        _reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), content.to_string()));
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn setup(provider: Arc<ScriptedProvider>) -> (MessageDispatcher, Arc<InMemoryContextStore>) {
    let store = Arc::new(InMemoryContextStore::default());
    let gateway = AiGateway::new(provider);
    (MessageDispatcher::new(store.clone(), Some(gateway)), store)
}

fn text(chat: &str, content: &str) -> ChannelMessage {
    ChannelMessage::text("recording", chat, "15550001", content)
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_hello_gets_ai_reply_and_two_turns() {
    let provider = Arc::new(ScriptedProvider::text("Hi there! 👋"));
    let (dispatcher, store) = setup(provider.clone());
    let channel = RecordingChannel::new();

    let reply = dispatcher.dispatch(&channel, &text("c1", "Hello")).await;

    assert_eq!(reply.as_deref(), Some("Hi there! 👋"));
    assert_eq!(channel.replies(), vec!["Hi there! 👋"]);
    assert_eq!(provider.calls(), 1);

    let ctx = store.peek(&ConversationId::from("c1")).await.unwrap().unwrap();
    assert_eq!(ctx.history.len(), 2);
    assert_eq!(ctx.history[0].role, Role::User);
    assert_eq!(ctx.history[0].text, "Hello");
    assert_eq!(ctx.history[1].role, Role::Assistant);
    assert_eq!(ctx.history[1].text, "Hi there! 👋");
}

#[tokio::test]
async fn e2e_clear_wipes_history_without_ai_call() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let (dispatcher, store) = setup(provider.clone());
    let id = ConversationId::from("c1");
    store.get(&id, &ContextProfile::default()).await.unwrap();
    for turn in ["one", "two", "three"] {
        store.append_user(&id, turn).await.unwrap();
    }
    let channel = RecordingChannel::new();

    let reply = dispatcher.dispatch(&channel, &text("c1", "!clear")).await;

    assert_eq!(reply.as_deref(), Some(CLEARED_REPLY));
    assert_eq!(provider.calls(), 0);
    let ctx = store.get(&id, &ContextProfile::default()).await.unwrap();
    assert!(ctx.history.is_empty());
}

#[tokio::test]
async fn e2e_image_with_failing_backend_gets_fallback_ack() {
    let provider = Arc::new(ScriptedProvider::failing(ProviderError::Network(
        "connection reset".into(),
    )));
    let (dispatcher, store) = setup(provider);
    let channel = RecordingChannel::new();

    let mut msg = text("c1", "");
    msg.kind = MessageKind::Image;
    let reply = dispatcher.dispatch(&channel, &msg).await;

    assert_eq!(reply.as_deref(), Some(ACK_FALLBACK));
    assert_eq!(channel.replies().len(), 1);
    assert!(!channel.replies()[0].is_empty());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn e2e_quota_failure_replies_fallback_without_assistant_turn() {
    let provider = Arc::new(ScriptedProvider::failing(ProviderError::ApiError {
        status_code: 429,
        message: "QUOTA_EXCEEDED: daily limit reached".into(),
    }));
    let (dispatcher, store) = setup(provider);
    let channel = RecordingChannel::new();

    let reply = dispatcher.dispatch(&channel, &text("c1", "Tell me a joke")).await;

    assert_eq!(reply.as_deref(), Some(FailureKind::QuotaExceeded.fallback_text()));
    let ctx = store.peek(&ConversationId::from("c1")).await.unwrap().unwrap();
    assert_eq!(ctx.history.len(), 1);
    assert_eq!(ctx.history[0].role, Role::User);
}

#[tokio::test]
async fn e2e_unrecognized_failure_uses_generic_fallback() {
    let provider = Arc::new(ScriptedProvider::failing(ProviderError::ApiError {
        status_code: 500,
        message: "internal".into(),
    }));
    let (dispatcher, _) = setup(provider);
    let channel = RecordingChannel::new();

    let reply = dispatcher.dispatch(&channel, &text("c1", "Hi")).await;
    assert_eq!(reply.as_deref(), Some(UNKNOWN_FALLBACK));
}

#[tokio::test]
async fn e2e_ping_variants_match() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let (dispatcher, _) = setup(provider.clone());
    let channel = RecordingChannel::new();

    dispatcher.dispatch(&channel, &text("c1", "!ping")).await;
    dispatcher.dispatch(&channel, &text("c1", " !PING ")).await;

    assert_eq!(channel.replies(), vec![PONG_REPLY, PONG_REPLY]);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn e2e_follow_up_sees_previous_turns() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(text_response("Nice to meet you, Alice!")),
        Ok(text_response("Your name is Alice.")),
    ]));
    let (dispatcher, store) = setup(provider.clone());
    let channel = RecordingChannel::new();

    dispatcher.dispatch(&channel, &text("c1", "I'm Alice")).await;
    dispatcher.dispatch(&channel, &text("c1", "What's my name?")).await;

    assert_eq!(provider.calls(), 2);
    let ctx = store.peek(&ConversationId::from("c1")).await.unwrap().unwrap();
    assert_eq!(ctx.history.len(), 4);
    assert_eq!(channel.replies()[1], "Your name is Alice.");
}

#[tokio::test]
async fn e2e_broadcast_status_is_ignored() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let (dispatcher, store) = setup(provider.clone());
    let channel = RecordingChannel::new();

    let reply = dispatcher
        .dispatch(&channel, &text("status@broadcast", "story update"))
        .await;

    assert!(reply.is_none());
    assert!(channel.replies().is_empty());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn e2e_whatsapp_without_allowlist_answers_everyone() {
    let config: AppConfig = toml::from_str("[channels.whatsapp]\nenabled = true\n").unwrap();
    let registry = ChannelRegistry::from_config(&config);
    let mut rx = registry.start_all().await.unwrap();
    let whatsapp = registry.whatsapp().unwrap().clone();
    assert!(whatsapp.is_allowed("15550001"));

    let (dispatcher, _) = setup(Arc::new(ScriptedProvider::new(vec![])));
    whatsapp
        .inject_json(r#"{"id":"m1","from":"15550001@c.us","type":"chat","body":"!ping"}"#)
        .await
        .unwrap();

    let (name, msg) = rx.recv().await.unwrap();
    let channel = registry.get(&name).unwrap().clone();
    let reply = dispatcher.dispatch(channel.as_ref(), &msg.unwrap()).await;
    assert_eq!(reply.as_deref(), Some(PONG_REPLY));

    let outbox = whatsapp.drain_outbox().await;
    assert_eq!(outbox, vec![OutboundEvent::message("15550001@c.us", PONG_REPLY, Some("m1"))]);
}

#[tokio::test]
async fn e2e_whatsapp_event_round_trip() {
    let whatsapp = Arc::new(WhatsAppChannel::new(WhatsAppConfig::default()));
    let mut registry = ChannelRegistry::new();
    registry.register_whatsapp(whatsapp.clone());
    let mut rx = registry.start_all().await.unwrap();

    let provider = Arc::new(ScriptedProvider::text("Hello from the bot"));
    let (dispatcher, _) = setup(provider);
    let dispatcher = Arc::new(dispatcher);

    whatsapp
        .inject_json(
            r#"{"id":"m1","from":"15550001@c.us","type":"chat","body":"Hi","notifyName":"Alice"}"#,
        )
        .await
        .unwrap();

    let (name, msg) = rx.recv().await.unwrap();
    let msg = msg.unwrap();
    let channel = registry.get(&name).unwrap().clone();
    let reply = dispatcher.spawn_dispatch(channel, msg).await.unwrap();
    assert_eq!(reply.as_deref(), Some("Hello from the bot"));

    let outbox = whatsapp.drain_outbox().await;
    assert_eq!(outbox.len(), 2);
    assert_eq!(outbox[0], OutboundEvent::typing("15550001@c.us"));
    assert_eq!(outbox[1].kind, OutboundKind::Message);
    assert_eq!(outbox[1].chat_id, "15550001@c.us");
    assert_eq!(outbox[1].content, "Hello from the bot");
    assert_eq!(outbox[1].reply_to.as_deref(), Some("m1"));
}
