//! Shared test helpers for dispatcher and gateway tests.

use async_trait::async_trait;
use parley_core::channel::{Channel, ChannelId, ChannelMessage};
use parley_core::error::{ChannelError, ProviderError};
use parley_core::provider::{Completion, Provider, Usage};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// A mock provider that returns a sequence of scripted results.
///
/// Each call to `generate` returns the next result in the queue and records
/// the prompt. Panics if more calls are made than results provided.
pub struct ScriptedProvider {
    results: Mutex<Vec<Result<Completion, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(results: Vec<Result<Completion, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(vec![Ok(completion(text))])
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn generate(&self, prompt: &str) -> Result<Completion, ProviderError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len() - 1
        };
        let mut results = self.results.lock().unwrap();
        if results.is_empty() {
            panic!("ScriptedProvider: no more results (call #{call})");
        }
        results.remove(0)
    }
}

/// A provider that never answers.
pub struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging_mock"
    }

    async fn generate(&self, _prompt: &str) -> Result<Completion, ProviderError> {
        std::future::pending().await
    }
}

/// A provider that panics on every call.
pub struct PanickingProvider;

#[async_trait]
impl Provider for PanickingProvider {
    fn name(&self) -> &str {
        "panicking_mock"
    }

    async fn generate(&self, _prompt: &str) -> Result<Completion, ProviderError> {
        panic!("backend exploded")
    }
}

pub fn completion(text: &str) -> Completion {
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

/// A channel that records every reply it is asked to send.
pub struct RecordingChannel {
    id: ChannelId,
    pub sent: Mutex<Vec<(String, String, Option<String>)>>,
    pub typing: Mutex<usize>,
    pub healthy: bool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("recording".into()),
            sent: Mutex::new(Vec::new()),
            typing: Mutex::new(0),
            healthy: true,
        }
    }

    pub fn replies(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, content, _)| content.clone())
            .collect()
    }
}

#[async_trait]
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
        reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push((
            chat_id.to_string(),
            content.to_string(),
            reply_to.map(String::from),
        ));
        Ok(())
    }

    async fn send_typing(&self, _chat_id: &str) -> Result<(), ChannelError> {
        *self.typing.lock().unwrap() += 1;
        Ok(())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        sender_id != "blocked"
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(self.healthy)
    }
}
