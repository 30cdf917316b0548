//! Conversation state, durable persistence, and the chat send pipeline.
//!
//! This crate owns the in-memory conversation registry, the sync engine that
//! mirrors it against a durable store, and the client pipeline that wires
//! both to the completion gateway.

mod client;
mod conversation;
mod error;
pub mod store;
mod sync;
#[cfg(test)]
mod testing;

pub use client::{ChatClient, SendOutcome};
pub use conversation::{Conversation, ConversationStore, derive_title};
pub use error::CoreError;
pub use store::{DurableStore, FsDurableStore, HttpDurableStore, StoreError};
pub use sync::{SaveOutcome, SyncEngine};
