//! Wire and data types shared across the Banter crates.
//!
//! The durable-record JSON shape in this crate is a compatibility contract:
//! records written by older deployments must round-trip unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Opaque, time-derived identifier for a chat.
pub type ChatId = String;

/// Speaker role for a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User-authored message.
    User,
    /// Assistant-authored message.
    Assistant,
}

impl Role {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a role from a lowercase string, defaulting to user.
    pub fn parse(value: &str) -> Self {
        if value == "assistant" {
            Role::Assistant
        } else {
            Role::User
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Role::parse(value))
    }
}

/// File context attached to a single message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Attachment {
    /// Uploaded image, sent to providers as base64.
    Image {
        /// Upload location the image bytes can be fetched from.
        url: String,
        /// Mime type hint reported by the uploader.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mimetype: Option<String>,
        /// Original filename, when known.
        #[serde(
            rename = "originalName",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        original_name: Option<String>,
    },
    /// Uploaded document whose text is extracted at send time.
    Document {
        /// Upload location of the raw document.
        url: String,
        /// Original filename.
        #[serde(rename = "originalName")]
        original_name: String,
        /// Text extracted by the parse collaborator; populated lazily.
        #[serde(
            rename = "extractedText",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        extracted_text: Option<String>,
        /// Parser metadata (page counts, file type, etc).
        #[serde(
            rename = "extractedMeta",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        extracted_meta: Option<Value>,
    },
}

impl Attachment {
    /// Short transcript description, used for titles when a message has no text.
    pub fn describe(&self) -> String {
        match self {
            Attachment::Image { url, original_name, .. } => {
                format!("[image] {}", original_name.as_deref().unwrap_or(url))
            }
            Attachment::Document { original_name, .. } => {
                format!("[document] {original_name}")
            }
        }
    }
}

/// Message stored in a conversation transcript. Immutable once created;
/// insertion order is the transcript order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role that produced the message.
    pub role: Role,
    /// Message content.
    pub content: String,
    /// Timestamp for the message.
    pub timestamp: DateTime<Utc>,
    /// Optional file context.
    #[serde(rename = "fileData", default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>, attachment: Option<Attachment>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            attachment,
        }
    }
}

/// Client-sent payload for a durable save. The store computes `updated_at`,
/// `saved_at`, and `message_count` on its side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatDraft {
    /// Chat identifier.
    pub id: ChatId,
    /// Frozen chat title.
    pub title: String,
    /// Full transcript.
    pub messages: Vec<Message>,
    /// Model identifier the chat was started with.
    pub model: String,
    /// Chat creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Durable on-disk/server-side representation of a chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DurableChatRecord {
    /// Chat identifier.
    pub id: ChatId,
    /// Frozen chat title.
    pub title: String,
    /// Full transcript.
    pub messages: Vec<Message>,
    /// Model identifier the chat was started with.
    pub model: String,
    /// Chat creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last time the record content changed.
    pub updated_at: DateTime<Utc>,
    /// Last time the record was written; duplicates resolve by this field.
    pub saved_at: DateTime<Utc>,
    /// Message count at save time.
    pub message_count: usize,
}

/// Listing view of a durable record (no transcript).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSummary {
    /// Chat identifier.
    pub id: ChatId,
    /// Frozen chat title.
    pub title: String,
    /// Model identifier.
    pub model: String,
    /// Chat creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last time the record content changed.
    pub updated_at: DateTime<Utc>,
    /// Last time the record was written.
    pub saved_at: DateTime<Utc>,
    /// Message count at save time.
    #[serde(default)]
    pub message_count: usize,
    /// Backing filename, when the store exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl From<&DurableChatRecord> for ChatSummary {
    fn from(record: &DurableChatRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            model: record.model.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            saved_at: record.saved_at,
            message_count: record.message_count,
            filename: None,
        }
    }
}

/// Envelope returned by the durable store list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatListEnvelope {
    /// One summary per chat id, newest `saved_at` first.
    pub chats: Vec<ChatSummary>,
    /// Number of summaries.
    pub count: usize,
}

/// Acknowledgement returned by the durable store save endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveReceipt {
    /// Whether the save succeeded.
    pub success: bool,
    /// Backing filename the record was written to.
    pub filename: String,
    /// Chat identifier the record was saved under.
    pub chat_id: ChatId,
    /// True when an existing record was overwritten in place.
    pub updated: bool,
}
