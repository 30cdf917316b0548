//! Error types for conversation state and the send pipeline.

use crate::store::StoreError;
use banter_rs_gateway::GatewayError;
use banter_rs_protocol::ChatId;
use thiserror::Error;

/// Errors returned by conversation store and client operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Chat id is unknown to the store.
    #[error("unknown chat: {0}")]
    UnknownChat(ChatId),
    /// A send is already outstanding; concurrent sends are rejected, not
    /// queued.
    #[error("a send is already in flight")]
    SendInFlight,
    /// Completion gateway failure. Sends turn these into transcript
    /// messages instead; this variant is for callers going around the
    /// pipeline.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// Durable store failure outside the send pipeline.
    #[error(transparent)]
    Store(#[from] StoreError),
}
