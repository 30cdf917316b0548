//! In-memory store double shared by the unit suites.

use crate::store::{DurableStore, StoreError};
use async_trait::async_trait;
use banter_rs_protocol::{ChatDraft, ChatId, ChatSummary, DurableChatRecord, SaveReceipt};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Durable store backed by a map, with write counting and one-shot failure
/// injection.
#[derive(Default)]
pub(crate) struct MemoryStore {
    records: Mutex<HashMap<ChatId, DurableChatRecord>>,
    saves: AtomicUsize,
    fail_next_save: AtomicBool,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far.
    pub(crate) fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    /// Make the next save fail with a rejected-request error.
    pub(crate) fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn save(&self, draft: &ChatDraft) -> Result<SaveReceipt, StoreError> {
        if self.fail_next_save.swap(false, Ordering::Relaxed) {
            return Err(StoreError::Rejected {
                status: 500,
                body: "injected save failure".to_string(),
            });
        }
        let now = Utc::now();
        let record = DurableChatRecord {
            id: draft.id.clone(),
            title: draft.title.clone(),
            messages: draft.messages.clone(),
            model: draft.model.clone(),
            created_at: draft.created_at,
            updated_at: now,
            saved_at: now,
            message_count: draft.messages.len(),
        };
        let updated = self
            .records
            .lock()
            .insert(record.id.clone(), record)
            .is_some();
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(SaveReceipt {
            success: true,
            filename: format!("chat_mem_{}.json", draft.id),
            chat_id: draft.id.clone(),
            updated,
        })
    }

    async fn list(&self) -> Result<Vec<ChatSummary>, StoreError> {
        let mut summaries: Vec<ChatSummary> = self
            .records
            .lock()
            .values()
            .map(ChatSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(summaries)
    }

    async fn load(&self, id: &str) -> Result<Option<DurableChatRecord>, StoreError> {
        Ok(self.records.lock().get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.lock().remove(id).is_some())
    }
}
