//! Durable chat persistence.
//!
//! Two backends share one trait: a filesystem store writing one JSON file
//! per save, and an HTTP client for a remote store speaking the same record
//! shape. Both resolve duplicate records for an id by the latest `saved_at`.

mod fs;
mod http;

pub use fs::FsDurableStore;
pub use http::HttpDurableStore;

use async_trait::async_trait;
use banter_rs_protocol::{ChatDraft, ChatSummary, DurableChatRecord, SaveReceipt};
use thiserror::Error;

/// Errors from a durable store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem read or write failed.
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// A stored record could not be encoded or decoded.
    #[error("record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    /// The remote store was unreachable.
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The remote store answered with a failure status.
    #[error("store rejected the request: status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },
}

/// Backend-neutral persistence interface for chat records.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Write a chat record, replacing any existing record for the same id.
    async fn save(&self, draft: &ChatDraft) -> Result<SaveReceipt, StoreError>;

    /// List one summary per chat id, newest `saved_at` first.
    async fn list(&self) -> Result<Vec<ChatSummary>, StoreError>;

    /// Load the record for an id, or `None` when nothing is stored.
    async fn load(&self, id: &str) -> Result<Option<DurableChatRecord>, StoreError>;

    /// Delete every record stored under an id; false when none existed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

/// Fill in the server-side fields of a draft at save time.
pub(crate) fn seal_draft(draft: &ChatDraft) -> DurableChatRecord {
    let now = chrono::Utc::now();
    DurableChatRecord {
        id: draft.id.clone(),
        title: draft.title.clone(),
        messages: draft.messages.clone(),
        model: draft.model.clone(),
        created_at: draft.created_at,
        updated_at: now,
        saved_at: now,
        message_count: draft.messages.len(),
    }
}
