//! Chat channel implementations for Parley.
//!
//! Each channel connects to a chat platform and relays messages to/from
//! the dispatcher. Channels are trait-based and platform-agnostic.
//!
//! Available channels:
//! - **CLI** - Interactive terminal chat (stdin/stdout)
//! - **WhatsApp** - In-process adapter fed by a bridge process or tests
//! - **Registry** - Central channel manager and message router

pub mod cli;
pub mod registry;
pub mod whatsapp;

pub use cli::CliChannel;
pub use registry::ChannelRegistry;
pub use whatsapp::{
    ClientState, OutboundEvent, OutboundKind, WhatsAppChannel, WhatsAppConfig, WhatsAppEvent,
};
