//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley chat dispatcher.
//! This crate has **zero framework dependencies** - it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is defined as a trait here. Implementations live in their
//! respective crates:
//! - [`Channel`] - the chat transport (WhatsApp, terminal, ...)
//! - [`Provider`] - the generative-text backend (Gemini, OpenAI-compatible)
//! - [`ContextStore`] - per-conversation rolling history
//!
//! The dispatcher in `parley-agent` only ever talks to these traits, so tests
//! can swap in scripted mocks.

pub mod error;
pub mod message;
pub mod context;
pub mod provider;
pub mod channel;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{ConversationId, ConversationKind, Role, Turn};
pub use context::{ContextProfile, ContextStore, ConversationContext};
pub use provider::{Completion, Provider, Usage};
pub use channel::{Channel, ChannelId, ChannelMessage, MediaKind, MessageKind};
