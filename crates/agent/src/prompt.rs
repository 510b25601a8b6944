//! Prompt assembly.
//!
//! Turns (persona, conversation metadata, recent turns, new message) into a
//! single `GenerationRequest`. Assembly is deterministic and never touches the
//! context store: it works on a snapshot of the history.

use parley_core::context::ConversationContext;
use parley_core::message::{ConversationKind, Turn};
use serde::{Deserialize, Serialize};

/// Number of recent turns included in each prompt.
pub const DEFAULT_CONTEXT_WINDOW: usize = 5;

pub const DEFAULT_PERSONA: &str = "You are a helpful WhatsApp AI assistant. Your responses should be:
- Friendly and conversational
- Concise but informative (keep responses under 200 words when possible)
- Use emojis appropriately to make conversations engaging
- Be helpful and try to provide practical solutions
- If you don't know something, admit it honestly
- Avoid overly technical language unless specifically asked
- Remember this is a WhatsApp chat, so format responses accordingly";

/// Optional facts about the conversation shown to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMetadata {
    pub display_name: Option<String>,
    pub kind: Option<ConversationKind>,
}

impl From<&ConversationContext> for PromptMetadata {
    fn from(ctx: &ConversationContext) -> Self {
        Self {
            display_name: Some(ctx.display_name.clone()),
            kind: Some(ctx.kind),
        }
    }
}

/// Everything the backend needs for one reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub persona: String,
    pub metadata: PromptMetadata,
    /// At most the assembler's window, oldest first
    pub recent_turns: Vec<Turn>,
    pub user_message: String,
}

impl GenerationRequest {
    /// Render the request as the single prompt string sent to the backend.
    pub fn render(&self) -> String {
        let mut prompt = format!("{}\n\n", self.persona);

        if let Some(name) = &self.metadata.display_name {
            prompt.push_str(&format!("User's name: {name}\n"));
        }
        if let Some(kind) = &self.metadata.kind {
            prompt.push_str(&format!("Chat type: {kind}\n"));
        }

        if !self.recent_turns.is_empty() {
            prompt.push_str("Recent conversation context:\n");
            for turn in &self.recent_turns {
                prompt.push_str(&format!("{}: {}\n", turn.speaker, turn.text));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!(
            "Current user message: {}\n\nPlease respond as the AI assistant:",
            self.user_message
        ));
        prompt
    }
}

/// Builds generation requests with a fixed persona and history window.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    persona: String,
    window: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA, DEFAULT_CONTEXT_WINDOW)
    }
}

impl PromptAssembler {
    pub fn new(persona: impl Into<String>, window: usize) -> Self {
        Self {
            persona: persona.into(),
            window,
        }
    }

    pub fn assemble(
        &self,
        metadata: PromptMetadata,
        history: &[Turn],
        user_message: &str,
    ) -> GenerationRequest {
        let start = history.len().saturating_sub(self.window);
        GenerationRequest {
            persona: self.persona.clone(),
            metadata,
            recent_turns: history[start..].to_vec(),
            user_message: user_message.to_string(),
        }
    }
}
