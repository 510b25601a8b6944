//! The message-dispatch core of Parley.
//!
//! Every inbound message goes through the [`MessageDispatcher`]:
//!
//! 1. **Filter** messages from the bot itself and from broadcast senders
//! 2. **Commands** (`!ping`, `!clear`, ...) are answered locally by the [`CommandRouter`]
//! 3. **Media** gets a best-effort acknowledgment from the [`AiGateway`]
//! 4. **Text** is recorded in the conversation context, assembled into a
//!    prompt by the [`PromptAssembler`] and answered by the [`AiGateway`]
//!
//! Backend failures are classified by the [`FailureClassifier`] into a small
//! set of kinds, each with safe user-facing fallback text.

pub mod commands;
pub mod dispatcher;
pub mod failure;
pub mod gateway;
pub mod prompt;
pub mod stats;

#[cfg(test)]
mod test_helpers;

pub use commands::{Command, CommandRouter};
pub use dispatcher::MessageDispatcher;
pub use failure::{FailureClassifier, FailureKind, GenerationOutcome, TokenUsage};
pub use gateway::{AiGateway, Intent, MessageAnalysis, Sentiment};
pub use prompt::{GenerationRequest, PromptAssembler, PromptMetadata, DEFAULT_PERSONA};
pub use stats::RuntimeStats;
