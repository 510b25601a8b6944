//! Conversation context store implementations for Parley.
//!
//! Contexts live only as long as the process; there is no persistent backend.

pub mod in_memory;

pub use in_memory::InMemoryContextStore;
