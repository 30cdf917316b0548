//! HTTP client for a remote chat store.

use super::{DurableStore, StoreError};
use async_trait::async_trait;
use banter_rs_protocol::{ChatDraft, ChatListEnvelope, ChatSummary, DurableChatRecord, SaveReceipt};
use log::debug;
use reqwest::{Client, Response, StatusCode};

/// Chat store reached over HTTP, speaking the same record shape as
/// [`super::FsDurableStore`] serves from disk.
pub struct HttpDurableStore {
    client: Client,
    base_url: String,
}

impl HttpDurableStore {
    /// Create a store client for `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn ensure_success(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl DurableStore for HttpDurableStore {
    async fn save(&self, draft: &ChatDraft) -> Result<SaveReceipt, StoreError> {
        let response = self
            .client
            .post(format!("{}/api/chats/save", self.base_url))
            .json(draft)
            .send()
            .await?;
        let receipt: SaveReceipt = Self::ensure_success(response).await?.json().await?;
        debug!(
            "remote save acknowledged (chat_id={}, file={}, updated={})",
            receipt.chat_id, receipt.filename, receipt.updated
        );
        Ok(receipt)
    }

    async fn list(&self) -> Result<Vec<ChatSummary>, StoreError> {
        let response = self
            .client
            .get(format!("{}/api/chats/list", self.base_url))
            .send()
            .await?;
        let envelope: ChatListEnvelope = Self::ensure_success(response).await?.json().await?;
        Ok(envelope.chats)
    }

    async fn load(&self, id: &str) -> Result<Option<DurableChatRecord>, StoreError> {
        let response = self
            .client
            .get(format!("{}/api/chats/load/{id}", self.base_url))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let record: DurableChatRecord = Self::ensure_success(response).await?.json().await?;
        Ok(Some(record))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let response = self
            .client
            .delete(format!("{}/api/chats/delete/{id}", self.base_url))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::ensure_success(response).await?;
        Ok(true)
    }
}
