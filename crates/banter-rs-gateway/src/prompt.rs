//! Transcript flattening and document context folding.

use banter_rs_protocol::{Attachment, Message, Role};
use std::borrow::Cow;

/// Question substituted when a document is sent without any message text.
const DEFAULT_DOCUMENT_QUESTION: &str = "Please analyze this document.";

/// Flatten a message history into a linear prompt.
///
/// Deterministic and pure: each message becomes `"User: ..."` or
/// `"Assistant: ..."` followed by a blank line, in transcript order. No
/// truncation or token budgeting; the provider is trusted to reject input
/// it cannot fit.
pub fn assemble(history: &[Message]) -> String {
    let mut prompt = String::new();
    for message in history {
        match message.role {
            Role::User => {
                prompt.push_str("User: ");
            }
            Role::Assistant => {
                prompt.push_str("Assistant: ");
            }
        }
        prompt.push_str(&message.content);
        prompt.push_str("\n\n");
    }
    prompt
}

/// Fold extracted document text into the final user message.
///
/// When the last message is user-authored and carries a document attachment
/// with extracted text (either its own or the explicit `attachment`
/// override), that one message's content is rewritten to embed the document;
/// all prior history is untouched. The stored conversation is never mutated;
/// callers get a copy only when a rewrite happens.
pub fn fold_document<'a>(
    history: &'a [Message],
    attachment: Option<&Attachment>,
) -> Cow<'a, [Message]> {
    let Some(last) = history.last() else {
        return Cow::Borrowed(history);
    };
    if last.role != Role::User {
        return Cow::Borrowed(history);
    }
    let effective = attachment.or(last.attachment.as_ref());
    let Some(Attachment::Document {
        original_name,
        extracted_text: Some(text),
        ..
    }) = effective
    else {
        return Cow::Borrowed(history);
    };

    let question = if last.content.trim().is_empty() {
        DEFAULT_DOCUMENT_QUESTION
    } else {
        last.content.as_str()
    };
    let folded = format!(
        "[Document: {original_name}]\n\n{text}\n\n---\n\nUser Question: {question}"
    );

    let mut rewritten = history.to_vec();
    if let Some(slot) = rewritten.last_mut() {
        slot.content = folded;
    }
    Cow::Owned(rewritten)
}
