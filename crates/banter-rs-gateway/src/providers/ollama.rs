//! Ollama adapter: flattened prompt, optional base64 image, token streaming.

use crate::GatewayError;
use crate::adapter::{ChunkSender, ImagePayload, ProviderAdapter, ensure_success};
use crate::prompt;
use async_trait::async_trait;
use banter_rs_config::{ProviderConfig, ProviderId};
use banter_rs_protocol::Message;
use futures_util::StreamExt;
use log::debug;
use serde::{Deserialize, Serialize};

/// Fallback when a response carries no text.
const NO_RESPONSE: &str = "No response";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<&'a str>>,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// One newline-delimited streaming object, or the whole non-streaming body.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
}

/// Parse one stream line opportunistically.
///
/// Lines that are empty, fail to parse, or carry an empty `response` field
/// yield nothing; a bad line never fails the call.
fn parse_stream_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let chunk: GenerateChunk = serde_json::from_str(line).ok()?;
    if chunk.response.is_empty() {
        None
    } else {
        Some(chunk.response)
    }
}

/// Reassembles newline-delimited JSON out of arbitrary network chunks,
/// forwarding each decoded piece in arrival order while accumulating the
/// full response text.
///
/// The carry is kept as raw bytes and only decoded one whole line at a
/// time: network chunks can split a multi-byte UTF-8 sequence anywhere.
#[derive(Debug, Default)]
pub(crate) struct StreamAccumulator {
    carry: Vec<u8>,
    full: String,
}

impl StreamAccumulator {
    /// Feed raw bytes; returns false once the receiver is gone, which the
    /// caller treats as cancellation.
    pub(crate) fn push_bytes(&mut self, bytes: &[u8], chunks: &ChunkSender) -> bool {
        self.carry.extend_from_slice(bytes);
        while let Some(pos) = self.carry.iter().position(|&byte| byte == b'\n') {
            let line: Vec<u8> = self.carry.drain(..=pos).collect();
            if !self.emit(&line, chunks) {
                return false;
            }
        }
        true
    }

    fn emit(&mut self, line: &[u8], chunks: &ChunkSender) -> bool {
        let Some(text) = parse_stream_line(&String::from_utf8_lossy(line)) else {
            return true;
        };
        self.full.push_str(&text);
        chunks.send(text).is_ok()
    }

    /// Flush any trailing partial line and return the accumulated text.
    pub(crate) fn finish(mut self, chunks: &ChunkSender) -> String {
        let line = std::mem::take(&mut self.carry);
        let _ = self.emit(&line, chunks);
        self.full
    }
}

/// Adapter for a local Ollama runtime.
#[derive(Debug, Default)]
pub struct OllamaAdapter {
    client: reqwest::Client,
}

impl OllamaAdapter {
    /// Create an adapter with a fresh HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// List models installed on the runtime.
    pub async fn list_models(&self, base_url: &str) -> Result<Vec<String>, GatewayError> {
        let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
        let response = ensure_success(self.client.get(&url).send().await?).await?;
        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|model| model.name).collect())
    }

    async fn send_streaming(
        &self,
        url: &str,
        request: &GenerateRequest<'_>,
        chunks: &ChunkSender,
    ) -> Result<String, GatewayError> {
        let response =
            ensure_success(self.client.post(url).json(request).send().await?).await?;
        let mut accumulator = StreamAccumulator::default();
        let mut body = response.bytes_stream();
        while let Some(piece) = body.next().await {
            let bytes = piece?;
            if !accumulator.push_bytes(&bytes, chunks) {
                debug!("chunk receiver closed; stopping stream early");
                break;
            }
        }
        Ok(accumulator.finish(chunks))
    }

    async fn send_atomic(
        &self,
        url: &str,
        request: &GenerateRequest<'_>,
    ) -> Result<String, GatewayError> {
        let response =
            ensure_success(self.client.post(url).json(request).send().await?).await?;
        let body: GenerateChunk = response.json().await?;
        if body.response.is_empty() {
            Ok(NO_RESPONSE.to_string())
        } else {
            Ok(body.response)
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    async fn send(
        &self,
        config: &ProviderConfig,
        history: &[Message],
        image: Option<&ImagePayload>,
        chunks: Option<&ChunkSender>,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/api/generate", config.endpoint.trim_end_matches('/'));
        let request = GenerateRequest {
            model: &config.model,
            prompt: prompt::assemble(history),
            stream: chunks.is_some(),
            images: image.map(|payload| vec![payload.data.as_str()]),
            options: GenerateOptions {
                temperature: config.temperature,
            },
        };
        debug!(
            "dispatching ollama request (model={}, stream={}, prompt_len={})",
            config.model,
            request.stream,
            request.prompt.len()
        );
        match chunks {
            Some(sender) => self.send_streaming(&url, &request, sender).await,
            None => self.send_atomic(&url, &request).await,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}
