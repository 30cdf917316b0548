//! In-memory conversation registry.

use crate::CoreError;
use banter_rs_protocol::{Attachment, ChatDraft, ChatId, DurableChatRecord, Message, Role};
use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Title assigned before the first user message freezes a real one.
const PLACEHOLDER_TITLE: &str = "New Chat";
/// Titles are truncated to this many characters.
const TITLE_LIMIT: usize = 50;

/// Derive a chat title from the first user message.
///
/// Prefers the message text, then the attachment description, then the
/// placeholder; truncates to 50 characters with a `...` marker.
pub fn derive_title(content: &str, attachment: Option<&Attachment>) -> String {
    let source = if !content.is_empty() {
        content.to_string()
    } else if let Some(attachment) = attachment {
        attachment.describe()
    } else {
        PLACEHOLDER_TITLE.to_string()
    };
    let mut title: String = source.chars().take(TITLE_LIMIT).collect();
    if source.chars().count() > TITLE_LIMIT {
        title.push_str("...");
    }
    title
}

/// One conversation and its transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    /// Opaque, time-derived identifier.
    pub id: ChatId,
    /// Title frozen from the first user message.
    pub title: String,
    /// Transcript in append order.
    pub messages: Vec<Message>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Model identifier the chat was started with.
    pub model: String,
}

impl Conversation {
    fn new(id: ChatId, model: String) -> Self {
        Self {
            id,
            title: PLACEHOLDER_TITLE.to_string(),
            messages: Vec::new(),
            created_at: Utc::now(),
            model,
        }
    }

    /// Zero-message conversations are transient and never persisted.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Complete means both a user and an assistant message are present; a
    /// lone half-turn is never persisted.
    pub fn is_complete(&self) -> bool {
        let mut has_user = false;
        let mut has_assistant = false;
        for message in &self.messages {
            match message.role {
                Role::User => has_user = true,
                Role::Assistant => has_assistant = true,
            }
        }
        has_user && has_assistant
    }

    /// Build the save payload for the durable store.
    pub fn to_draft(&self) -> ChatDraft {
        ChatDraft {
            id: self.id.clone(),
            title: self.title.clone(),
            messages: self.messages.clone(),
            model: self.model.clone(),
            created_at: self.created_at,
        }
    }
}

impl From<DurableChatRecord> for Conversation {
    fn from(record: DurableChatRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            messages: record.messages,
            created_at: record.created_at,
            model: record.model,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    chats: HashMap<ChatId, Conversation>,
    active: Option<ChatId>,
}

impl StoreInner {
    /// Millisecond-timestamp id, bumped on the rare same-millisecond clash.
    fn mint_id(&self) -> ChatId {
        let mut stamp = Utc::now().timestamp_millis();
        while self.chats.contains_key(&stamp.to_string()) {
            stamp += 1;
        }
        stamp.to_string()
    }

    fn start_new(&mut self, model: &str) -> ChatId {
        if let Some(active) = self.active.clone()
            && let Some(chat) = self.chats.get(&active)
            && chat.is_empty()
        {
            debug!("reusing empty active chat (chat_id={})", active);
            return active;
        }
        let id = self.mint_id();
        info!("created chat (chat_id={}, model={})", id, model);
        self.chats
            .insert(id.clone(), Conversation::new(id.clone(), model.to_string()));
        self.active = Some(id.clone());
        id
    }
}

/// Process-wide registry of conversations plus the active-chat pointer.
///
/// All operations are synchronous and never suspend mid-mutation; only the
/// single send pipeline mutates the active conversation.
#[derive(Default)]
pub struct ConversationStore {
    inner: RwLock<StoreInner>,
}

impl ConversationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new chat, reusing the active one while it is still empty, so
    /// at most one empty conversation exists at a time.
    pub fn start_new(&self, model: &str) -> ChatId {
        self.inner.write().start_new(model)
    }

    /// Append a message; the first user message freezes the title.
    pub fn append(
        &self,
        id: &str,
        role: Role,
        content: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> Result<Message, CoreError> {
        let mut inner = self.inner.write();
        let chat = inner
            .chats
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownChat(id.to_string()))?;
        let message = Message::new(role, content, attachment);
        debug!(
            "appending message (chat_id={}, role={}, content_len={})",
            id,
            message.role.as_str(),
            message.content.len()
        );
        chat.messages.push(message.clone());
        if role == Role::User && chat.messages.len() == 1 {
            chat.title = derive_title(&message.content, message.attachment.as_ref());
            debug!("froze title (chat_id={}, title={})", id, chat.title);
        }
        Ok(message)
    }

    /// Make `id` the active chat; false when the id is unknown.
    pub fn load(&self, id: &str) -> bool {
        let mut inner = self.inner.write();
        if !inner.chats.contains_key(id) {
            return false;
        }
        inner.active = Some(id.to_string());
        true
    }

    /// Remove a chat. Deleting the active chat immediately starts a new one
    /// so there is never no active conversation.
    pub fn delete(&self, id: &str, model: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.chats.remove(id).is_none() {
            return false;
        }
        info!("deleted chat (chat_id={})", id);
        if inner.active.as_deref() == Some(id) {
            inner.active = None;
            inner.start_new(model);
        }
        true
    }

    /// Insert or replace a conversation, used when merging durable records.
    pub fn insert(&self, conversation: Conversation) {
        self.inner
            .write()
            .chats
            .insert(conversation.id.clone(), conversation);
    }

    /// The active chat id, if any.
    pub fn active_id(&self) -> Option<ChatId> {
        self.inner.read().active.clone()
    }

    /// Clone of a conversation by id.
    pub fn get(&self, id: &str) -> Option<Conversation> {
        self.inner.read().chats.get(id).cloned()
    }

    /// Message count for a chat, if it exists.
    pub fn message_count(&self, id: &str) -> Option<usize> {
        self.inner.read().chats.get(id).map(|chat| chat.messages.len())
    }

    /// All non-empty conversations; the only view exposed for listings and
    /// persistence sweeps.
    pub fn list_non_empty(&self) -> HashMap<ChatId, Conversation> {
        self.inner
            .read()
            .chats
            .iter()
            .filter(|(_, chat)| !chat.is_empty())
            .map(|(id, chat)| (id.clone(), chat.clone()))
            .collect()
    }

    /// Drop every zero-message conversation. Safe at any time: the
    /// reuse-empty invariant means at most one such chat can exist.
    pub fn gc_empty(&self) {
        let mut inner = self.inner.write();
        inner.chats.retain(|_, chat| !chat.is_empty());
        if let Some(active) = inner.active.clone()
            && !inner.chats.contains_key(&active)
        {
            inner.active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationStore, derive_title};
    use banter_rs_protocol::{Attachment, Role};
    use pretty_assertions::assert_eq;

    const MODEL: &str = "llama3.2:3b";

    #[test]
    fn start_new_reuses_the_empty_active_chat() {
        let store = ConversationStore::new();
        let first = store.start_new(MODEL);
        let second = store.start_new(MODEL);
        assert_eq!(first, second);

        store.append(&first, Role::User, "hi", None).expect("append");
        let third = store.start_new(MODEL);
        assert_ne!(first, third);
        assert_eq!(store.active_id(), Some(third));
    }

    #[test]
    fn title_freezes_on_the_first_user_message() {
        let store = ConversationStore::new();
        let id = store.start_new(MODEL);
        store.append(&id, Role::User, "first question", None).expect("append");
        assert_eq!(store.get(&id).expect("chat").title, "first question");

        store.append(&id, Role::Assistant, "answer", None).expect("append");
        store
            .append(&id, Role::User, "a different second question", None)
            .expect("append");
        assert_eq!(store.get(&id).expect("chat").title, "first question");
    }

    #[test]
    fn title_truncates_and_marks_long_content() {
        let long = "x".repeat(60);
        let title = derive_title(&long, None);
        assert_eq!(title.chars().count(), 53);
        assert!(title.ends_with("..."));

        let exact = "y".repeat(50);
        assert_eq!(derive_title(&exact, None), exact);
    }

    #[test]
    fn title_falls_back_to_the_attachment_description() {
        let attachment = Attachment::Document {
            url: "/uploads/report.pdf".to_string(),
            original_name: "report.pdf".to_string(),
            extracted_text: None,
            extracted_meta: None,
        };
        assert_eq!(derive_title("", Some(&attachment)), "[document] report.pdf");
        assert_eq!(derive_title("", None), "New Chat");
    }

    #[test]
    fn deleting_the_active_chat_starts_a_fresh_one() {
        let store = ConversationStore::new();
        let id = store.start_new(MODEL);
        store.append(&id, Role::User, "hi", None).expect("append");

        assert!(store.delete(&id, MODEL));
        let active = store.active_id().expect("active chat");
        assert_ne!(active, id);
        assert!(store.get(&active).expect("chat").is_empty());

        assert!(!store.delete("missing", MODEL));
    }

    #[test]
    fn load_switches_the_active_pointer() {
        let store = ConversationStore::new();
        let first = store.start_new(MODEL);
        store.append(&first, Role::User, "hi", None).expect("append");
        let second = store.start_new(MODEL);
        assert_eq!(store.active_id(), Some(second));

        assert!(store.load(&first));
        assert_eq!(store.active_id(), Some(first));
        assert!(!store.load("missing"));
    }

    #[test]
    fn listing_and_gc_ignore_empty_chats() {
        let store = ConversationStore::new();
        let full = store.start_new(MODEL);
        store.append(&full, Role::User, "hi", None).expect("append");
        let empty = store.start_new(MODEL);

        let listed = store.list_non_empty();
        assert_eq!(listed.len(), 1);
        assert!(listed.contains_key(&full));

        store.gc_empty();
        assert_eq!(store.get(&empty), None);
        assert!(store.get(&full).is_some());
        assert_eq!(store.active_id(), None);
    }

    #[test]
    fn completeness_requires_both_roles() {
        let store = ConversationStore::new();
        let id = store.start_new(MODEL);
        assert!(!store.get(&id).expect("chat").is_complete());

        store.append(&id, Role::User, "hi", None).expect("append");
        assert!(!store.get(&id).expect("chat").is_complete());

        store.append(&id, Role::Assistant, "hello", None).expect("append");
        assert!(store.get(&id).expect("chat").is_complete());
    }
}
