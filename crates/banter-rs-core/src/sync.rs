//! Mirrors in-memory conversations into a durable store.

use crate::conversation::{Conversation, ConversationStore};
use crate::store::{DurableStore, StoreError};
use banter_rs_protocol::{ChatId, ChatSummary, DurableChatRecord, SaveReceipt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default minimum gap between saves of the same chat.
const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(3);

/// What happened to a save request.
#[derive(Debug)]
pub enum SaveOutcome {
    /// The record was written.
    Saved(SaveReceipt),
    /// The chat lacks a full user/assistant turn and was not persisted.
    SkippedIncomplete,
    /// A save for this chat ran inside the debounce window.
    Debounced,
}

/// Persistence policy in front of a [`DurableStore`].
///
/// Enforces two rules the backends do not know about: only complete
/// conversations (at least one user and one assistant message) are written,
/// and saves of the same chat are debounced so a burst of appends produces
/// one write.
pub struct SyncEngine {
    store: Arc<dyn DurableStore>,
    debounce: Duration,
    last_saved: Mutex<HashMap<ChatId, Instant>>,
}

impl SyncEngine {
    /// Create an engine with the default 3 second debounce window.
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self {
            store,
            debounce: DEFAULT_DEBOUNCE,
            last_saved: Mutex::new(HashMap::new()),
        }
    }

    /// Override the debounce window.
    pub fn with_debounce_window(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Whether a save for `id` is currently allowed. On true the save slot
    /// is claimed immediately so concurrent callers cannot both pass.
    fn claim_save_slot(&self, id: &str) -> bool {
        let mut last_saved = self.last_saved.lock();
        if let Some(last) = last_saved.get(id)
            && last.elapsed() < self.debounce
        {
            return false;
        }
        last_saved.insert(id.to_string(), Instant::now());
        true
    }

    fn release_save_slot(&self, id: &str) {
        self.last_saved.lock().remove(id);
    }

    /// Persist one conversation, subject to completeness and debounce.
    pub async fn save(&self, conversation: &Conversation) -> Result<SaveOutcome, StoreError> {
        if !conversation.is_complete() {
            debug!(
                "skipping save of incomplete chat (chat_id={}, messages={})",
                conversation.id,
                conversation.messages.len()
            );
            return Ok(SaveOutcome::SkippedIncomplete);
        }
        if !self.claim_save_slot(&conversation.id) {
            debug!("save debounced (chat_id={})", conversation.id);
            return Ok(SaveOutcome::Debounced);
        }
        match self.store.save(&conversation.to_draft()).await {
            Ok(receipt) => {
                info!(
                    "chat saved (chat_id={}, file={}, updated={})",
                    receipt.chat_id, receipt.filename, receipt.updated
                );
                Ok(SaveOutcome::Saved(receipt))
            }
            Err(error) => {
                // A failed write must not block the retry.
                self.release_save_slot(&conversation.id);
                Err(error)
            }
        }
    }

    /// Persist a conversation right now, ignoring the debounce window. Used
    /// on shutdown and after a chat switch.
    pub async fn flush(&self, conversation: &Conversation) -> Result<SaveOutcome, StoreError> {
        if !conversation.is_complete() {
            return Ok(SaveOutcome::SkippedIncomplete);
        }
        let receipt = self.store.save(&conversation.to_draft()).await?;
        self.last_saved
            .lock()
            .insert(conversation.id.clone(), Instant::now());
        Ok(SaveOutcome::Saved(receipt))
    }

    /// Summaries of everything in the durable store, newest first. Duplicate
    /// ids are collapsed here too, keeping the latest `saved_at`, so callers
    /// see one entry per chat regardless of the backend.
    pub async fn list_saved(&self) -> Result<Vec<ChatSummary>, StoreError> {
        let mut latest: HashMap<ChatId, ChatSummary> = HashMap::new();
        for summary in self.store.list().await? {
            match latest.get(&summary.id) {
                Some(kept) if kept.saved_at >= summary.saved_at => {}
                _ => {
                    latest.insert(summary.id.clone(), summary);
                }
            }
        }
        let mut summaries: Vec<ChatSummary> = latest.into_values().collect();
        summaries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(summaries)
    }

    /// Load one durable record.
    pub async fn load_saved(&self, id: &str) -> Result<Option<DurableChatRecord>, StoreError> {
        self.store.load(id).await
    }

    /// Delete a chat from the durable store.
    pub async fn delete_saved(&self, id: &str) -> Result<bool, StoreError> {
        self.last_saved.lock().remove(id);
        self.store.delete(id).await
    }

    /// Pull durable records into the registry. A durable record never
    /// overwrites an in-memory conversation that has more messages, so a
    /// reply that landed after the last save survives the merge. Returns
    /// the number of records merged in.
    pub async fn reconcile(&self, chats: &ConversationStore) -> Result<usize, StoreError> {
        let mut merged = 0;
        for summary in self.store.list().await? {
            let Some(record) = self.store.load(&summary.id).await? else {
                continue;
            };
            if let Some(existing) = chats.get(&record.id)
                && existing.messages.len() > record.messages.len()
            {
                warn!(
                    "keeping in-memory chat over durable copy (chat_id={}, memory={}, durable={})",
                    record.id,
                    existing.messages.len(),
                    record.messages.len()
                );
                continue;
            }
            chats.insert(Conversation::from(record));
            merged += 1;
        }
        info!("reconciled durable chats (merged={})", merged);
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::{SaveOutcome, SyncEngine};
    use crate::conversation::ConversationStore;
    use crate::testing::MemoryStore;
    use banter_rs_protocol::Role;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    const MODEL: &str = "llama3.2:3b";

    fn engine(store: &Arc<MemoryStore>) -> SyncEngine {
        SyncEngine::new(store.clone()).with_debounce_window(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn incomplete_chats_are_never_persisted() {
        let store = Arc::new(MemoryStore::new());
        let sync = engine(&store);
        let chats = ConversationStore::new();
        let id = chats.start_new(MODEL);
        chats.append(&id, Role::User, "hello?", None).expect("append");

        let outcome = sync
            .save(&chats.get(&id).expect("chat"))
            .await
            .expect("save");
        assert!(matches!(outcome, SaveOutcome::SkippedIncomplete));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn rapid_saves_collapse_into_one_write() {
        let store = Arc::new(MemoryStore::new());
        let sync = engine(&store);
        let chats = ConversationStore::new();
        let id = chats.start_new(MODEL);
        chats.append(&id, Role::User, "hi", None).expect("append");
        chats.append(&id, Role::Assistant, "hello", None).expect("append");
        let chat = chats.get(&id).expect("chat");

        assert!(matches!(
            sync.save(&chat).await.expect("save"),
            SaveOutcome::Saved(_)
        ));
        assert!(matches!(
            sync.save(&chat).await.expect("save"),
            SaveOutcome::Debounced
        ));
        assert_eq!(store.save_count(), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(matches!(
            sync.save(&chat).await.expect("save"),
            SaveOutcome::Saved(_)
        ));
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test]
    async fn failed_save_does_not_consume_the_debounce_slot() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_save();
        let sync = engine(&store);
        let chats = ConversationStore::new();
        let id = chats.start_new(MODEL);
        chats.append(&id, Role::User, "hi", None).expect("append");
        chats.append(&id, Role::Assistant, "hello", None).expect("append");
        let chat = chats.get(&id).expect("chat");

        sync.save(&chat).await.expect_err("injected failure");
        assert!(matches!(
            sync.save(&chat).await.expect("save"),
            SaveOutcome::Saved(_)
        ));
    }

    #[tokio::test]
    async fn flush_ignores_the_debounce_window() {
        let store = Arc::new(MemoryStore::new());
        let sync = engine(&store);
        let chats = ConversationStore::new();
        let id = chats.start_new(MODEL);
        chats.append(&id, Role::User, "hi", None).expect("append");
        chats.append(&id, Role::Assistant, "hello", None).expect("append");
        let chat = chats.get(&id).expect("chat");

        assert!(matches!(
            sync.save(&chat).await.expect("save"),
            SaveOutcome::Saved(_)
        ));
        assert!(matches!(
            sync.flush(&chat).await.expect("flush"),
            SaveOutcome::Saved(_)
        ));
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test]
    async fn reconcile_prefers_the_longer_in_memory_transcript() {
        let store = Arc::new(MemoryStore::new());
        let sync = engine(&store);
        let chats = ConversationStore::new();

        // Saved with two messages, then a third lands in memory only.
        let id = chats.start_new(MODEL);
        chats.append(&id, Role::User, "hi", None).expect("append");
        chats.append(&id, Role::Assistant, "hello", None).expect("append");
        sync.flush(&chats.get(&id).expect("chat")).await.expect("flush");
        chats.append(&id, Role::User, "and another thing", None).expect("append");

        let merged = sync.reconcile(&chats).await.expect("reconcile");
        assert_eq!(merged, 0);
        assert_eq!(chats.message_count(&id), Some(3));
    }

    #[tokio::test]
    async fn listing_collapses_duplicate_ids_from_the_backend() {
        use crate::store::{DurableStore, StoreError};
        use banter_rs_protocol::{ChatDraft, ChatSummary, DurableChatRecord, SaveReceipt};
        use chrono::{Duration as ChronoDuration, Utc};

        /// Backend whose listing surfaces stale duplicates.
        struct DupListStore;

        #[async_trait::async_trait]
        impl DurableStore for DupListStore {
            async fn save(&self, _draft: &ChatDraft) -> Result<SaveReceipt, StoreError> {
                unreachable!("listing only")
            }

            async fn list(&self) -> Result<Vec<ChatSummary>, StoreError> {
                let now = Utc::now();
                let summary = |id: &str, offset: i64, count: usize| ChatSummary {
                    id: id.to_string(),
                    title: format!("chat {id}"),
                    model: MODEL.to_string(),
                    created_at: now,
                    updated_at: now,
                    saved_at: now + ChronoDuration::seconds(offset),
                    message_count: count,
                    filename: None,
                };
                Ok(vec![
                    summary("7", 0, 2),
                    summary("7", 60, 5),
                    summary("8", 30, 1),
                ])
            }

            async fn load(&self, _id: &str) -> Result<Option<DurableChatRecord>, StoreError> {
                Ok(None)
            }

            async fn delete(&self, _id: &str) -> Result<bool, StoreError> {
                Ok(false)
            }
        }

        let sync = SyncEngine::new(Arc::new(DupListStore));
        let listed = sync.list_saved().await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "7");
        assert_eq!(listed[0].message_count, 5);
        assert_eq!(listed[1].id, "8");
    }

    #[tokio::test]
    async fn reconcile_pulls_unknown_chats_into_the_registry() {
        let store = Arc::new(MemoryStore::new());
        let sync = engine(&store);

        let other = ConversationStore::new();
        let id = other.start_new(MODEL);
        other.append(&id, Role::User, "hi", None).expect("append");
        other.append(&id, Role::Assistant, "hello", None).expect("append");
        sync.flush(&other.get(&id).expect("chat")).await.expect("flush");

        let chats = ConversationStore::new();
        let merged = sync.reconcile(&chats).await.expect("reconcile");
        assert_eq!(merged, 1);
        assert_eq!(chats.message_count(&id), Some(2));
    }
}
