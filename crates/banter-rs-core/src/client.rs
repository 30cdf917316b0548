//! The send pipeline: registry, gateway, and sync engine wired together.

use crate::conversation::{Conversation, ConversationStore};
use crate::error::CoreError;
use crate::sync::SyncEngine;
use banter_rs_config::Settings;
use banter_rs_gateway::{ChunkSender, Completer, remediation_hint};
use banter_rs_protocol::{Attachment, ChatId, ChatSummary, Message, Role};
use log::{info, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Result of one send through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The provider answered; the message is the appended assistant reply.
    Answered(Message),
    /// The provider failed; the message is the synthetic assistant reply
    /// carrying the error and a remediation hint.
    Failed(Message),
}

/// Releases the in-flight latch when a send finishes on any path.
struct SendGuard<'a>(&'a AtomicBool);

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Facade over the conversation registry, the completion gateway, and the
/// sync engine.
///
/// Holds the single in-flight latch: one send at a time, concurrent sends
/// are rejected rather than queued.
pub struct ChatClient {
    settings: Arc<RwLock<Settings>>,
    chats: ConversationStore,
    completer: Arc<dyn Completer>,
    sync: Arc<SyncEngine>,
    in_flight: AtomicBool,
}

impl ChatClient {
    /// Wire a client from its collaborators.
    pub fn new(
        settings: Arc<RwLock<Settings>>,
        completer: Arc<dyn Completer>,
        sync: Arc<SyncEngine>,
    ) -> Self {
        Self {
            settings,
            chats: ConversationStore::new(),
            completer,
            sync,
            in_flight: AtomicBool::new(false),
        }
    }

    /// The conversation registry.
    pub fn chats(&self) -> &ConversationStore {
        &self.chats
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    fn active_model(&self) -> String {
        self.settings.read().active_model()
    }

    /// The active chat id, starting a chat first if none exists.
    fn ensure_active(&self) -> ChatId {
        match self.chats.active_id() {
            Some(id) => id,
            None => self.chats.start_new(&self.active_model()),
        }
    }

    /// Start a new chat and make it active. The previous chat stays in the
    /// registry; it is flushed to the durable store first so switching away
    /// never loses a finished turn.
    pub async fn new_chat(&self) -> ChatId {
        if let Some(previous) = self.chats.active_id()
            && let Some(chat) = self.chats.get(&previous)
            && let Err(error) = self.sync.flush(&chat).await
        {
            warn!("flush before chat switch failed (chat_id={}, error={})", previous, error);
        }
        self.chats.start_new(&self.active_model())
    }

    /// Send one user message on the active chat and wait for the reply.
    ///
    /// The user message is appended before dispatch, so it survives a
    /// provider failure. Provider errors do not bubble out of the pipeline:
    /// they become a synthetic assistant message with a remediation hint and
    /// a [`SendOutcome::Failed`]. Persistence failures are logged and
    /// swallowed; the transcript in memory is the source of truth.
    pub async fn send(
        &self,
        content: impl Into<String>,
        attachment: Option<Attachment>,
        chunks: Option<ChunkSender>,
    ) -> Result<SendOutcome, CoreError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            return Err(CoreError::SendInFlight);
        }
        let _guard = SendGuard(&self.in_flight);

        let id = self.ensure_active();
        self.chats.append(&id, Role::User, content, attachment)?;
        let history = self
            .chats
            .get(&id)
            .ok_or_else(|| CoreError::UnknownChat(id.clone()))?
            .messages;

        let reply = match self.completer.complete(&history, None, chunks).await {
            Ok(answer) => {
                let message = self.chats.append(&id, Role::Assistant, answer, None)?;
                info!("send completed (chat_id={}, reply_len={})", id, message.content.len());
                SendOutcome::Answered(message)
            }
            Err(error) => {
                let message = self
                    .chats
                    .append(&id, Role::Assistant, self.failure_text(&error), None)?;
                warn!("send failed (chat_id={}, error={})", id, error);
                SendOutcome::Failed(message)
            }
        };

        if let Some(chat) = self.chats.get(&id)
            && let Err(error) = self.sync.save(&chat).await
        {
            warn!("save after send failed (chat_id={}, error={})", id, error);
        }
        Ok(reply)
    }

    /// User-facing text for a failed send.
    fn failure_text(&self, error: &banter_rs_gateway::GatewayError) -> String {
        let settings = self.settings();
        match settings.provider.parse() {
            Ok(provider) => {
                format!("Error: {error}\n\n{}", remediation_hint(provider, &settings))
            }
            Err(_) => format!("Error: {error}"),
        }
    }

    /// Summaries of every saved chat.
    pub async fn list_saved(&self) -> Result<Vec<ChatSummary>, CoreError> {
        Ok(self.sync.list_saved().await?)
    }

    /// Load a saved chat into the registry and make it active. False when
    /// the durable store has no record for the id.
    pub async fn open_saved(&self, id: &str) -> Result<bool, CoreError> {
        let Some(record) = self.sync.load_saved(id).await? else {
            return Ok(false);
        };
        // A longer in-memory transcript wins over the stored copy.
        match self.chats.get(&record.id) {
            Some(existing) if existing.messages.len() > record.messages.len() => {}
            _ => self.chats.insert(Conversation::from(record)),
        }
        Ok(self.chats.load(id))
    }

    /// Delete a chat from the registry and the durable store.
    pub async fn delete_chat(&self, id: &str) -> Result<bool, CoreError> {
        let existed_in_store = self.sync.delete_saved(id).await?;
        let existed_in_memory = self.chats.delete(id, &self.active_model());
        Ok(existed_in_store || existed_in_memory)
    }

    /// Merge every durable record into the registry, keeping longer
    /// in-memory transcripts.
    pub async fn reconcile(&self) -> Result<usize, CoreError> {
        Ok(self.sync.reconcile(&self.chats).await?)
    }

    /// Flush the active chat to the durable store, ignoring the debounce.
    pub async fn flush_active(&self) -> Result<(), CoreError> {
        if let Some(id) = self.chats.active_id()
            && let Some(chat) = self.chats.get(&id)
        {
            self.sync.flush(&chat).await?;
        }
        Ok(())
    }
}
