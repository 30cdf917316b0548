//! Gemini adapter: single-turn flattened prompt, inline image, atomic only.

use crate::GatewayError;
use crate::adapter::{ChunkSender, ImagePayload, ProviderAdapter, ensure_success};
use crate::prompt;
use async_trait::async_trait;
use banter_rs_config::{ProviderConfig, ProviderId};
use banter_rs_protocol::Message;
use log::debug;
use serde::{Deserialize, Serialize};

const NO_RESPONSE: &str = "No response";
const MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    InlineData {
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback", default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason", default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Build the single-turn payload: the whole history flattened into one text
/// part, with an inline image part prepended when present.
fn build_request(
    config: &ProviderConfig,
    history: &[Message],
    image: Option<&ImagePayload>,
) -> GenerateContentRequest {
    let mut parts = Vec::new();
    if let Some(payload) = image {
        parts.push(Part::InlineData {
            inline_data: InlineData {
                mime_type: payload.mime.clone(),
                data: payload.data.clone(),
            },
        });
    }
    parts.push(Part::Text {
        text: prompt::assemble(history),
    });
    GenerateContentRequest {
        contents: vec![Content { parts }],
        generation_config: GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        },
    }
}

/// Extract the answer, distinguishing a safety block from a missing answer.
fn extract_answer(response: GenerateContentResponse) -> Result<String, GatewayError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(GatewayError::Blocked { reason });
    }
    let answer = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text);
    Ok(answer.unwrap_or_else(|| NO_RESPONSE.to_string()))
}

/// Adapter for the hosted Gemini generateContent API.
#[derive(Debug, Default)]
pub struct GeminiAdapter {
    client: reqwest::Client,
}

impl GeminiAdapter {
    /// Create an adapter with a fresh HTTP client.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn send(
        &self,
        config: &ProviderConfig,
        history: &[Message],
        image: Option<&ImagePayload>,
        _chunks: Option<&ChunkSender>,
    ) -> Result<String, GatewayError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::Config("Gemini API key not configured".to_string()))?;
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            config.endpoint.trim_end_matches('/'),
            config.model,
            api_key
        );
        let request = build_request(config, history, image);
        debug!(
            "dispatching gemini request (model={}, with_image={})",
            config.model,
            image.is_some()
        );
        let response =
            ensure_success(self.client.post(&url).json(&request).send().await?).await?;
        let body: GenerateContentResponse = response.json().await?;
        extract_answer(body)
    }
}
