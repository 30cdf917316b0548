//! Test doubles shared across the Banter crates.
//!
//! Completer doubles only; store doubles live next to the suites that use
//! them. Not part of the public API surface; kept out of the registry via
//! `publish = false`.

use async_trait::async_trait;
use banter_rs_gateway::{ChunkSender, Completer, GatewayError};
use banter_rs_protocol::{Attachment, Message};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Completer that always answers with a fixed string and records every
/// history it was handed. When a chunk sender is supplied, the answer is
/// forwarded as a single chunk first.
pub struct FixedCompleter {
    answer: String,
    histories: Mutex<Vec<Vec<Message>>>,
}

impl FixedCompleter {
    pub fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            histories: Mutex::new(Vec::new()),
        })
    }

    /// The most recent history seen, if any.
    pub fn last_history(&self) -> Option<Vec<Message>> {
        self.histories.lock().last().cloned()
    }

    /// Number of completion calls observed.
    pub fn call_count(&self) -> usize {
        self.histories.lock().len()
    }
}

#[async_trait]
impl Completer for FixedCompleter {
    async fn complete(
        &self,
        history: &[Message],
        _attachment: Option<&Attachment>,
        chunks: Option<ChunkSender>,
    ) -> Result<String, GatewayError> {
        self.histories.lock().push(history.to_vec());
        if let Some(chunks) = chunks {
            let _ = chunks.send(self.answer.clone());
        }
        Ok(self.answer.clone())
    }
}

/// Completer that fails every call with a provider error.
pub struct FailingCompleter {
    status: u16,
    body: String,
}

impl FailingCompleter {
    pub fn new(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            status,
            body: body.to_string(),
        })
    }
}

#[async_trait]
impl Completer for FailingCompleter {
    async fn complete(
        &self,
        _history: &[Message],
        _attachment: Option<&Attachment>,
        _chunks: Option<ChunkSender>,
    ) -> Result<String, GatewayError> {
        Err(GatewayError::Provider {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

/// Completer that sleeps before answering, for exercising in-flight latches.
pub struct SlowCompleter {
    answer: String,
    delay: Duration,
}

impl SlowCompleter {
    pub fn new(answer: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            delay,
        })
    }
}

#[async_trait]
impl Completer for SlowCompleter {
    async fn complete(
        &self,
        _history: &[Message],
        _attachment: Option<&Attachment>,
        _chunks: Option<ChunkSender>,
    ) -> Result<String, GatewayError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.answer.clone())
    }
}
