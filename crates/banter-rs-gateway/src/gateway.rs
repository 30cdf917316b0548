//! Provider selection and uniform completion dispatch.

use crate::GatewayError;
use crate::adapter::{ChunkSender, ProviderAdapter};
use crate::image::{HttpImageFetcher, ImageFetcher};
use crate::prompt;
use crate::providers::{GeminiAdapter, OllamaAdapter, OpenRouterAdapter};
use async_trait::async_trait;
use banter_rs_config::{ProviderId, Settings};
use banter_rs_protocol::{Attachment, Message};
use log::{debug, info};
use parking_lot::RwLock;
use std::sync::Arc;

/// Anything that can answer a completion request. Implemented by [`Gateway`]
/// and by test doubles.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Produce the final response text for a history, forwarding chunks when
    /// the backing provider streams.
    async fn complete(
        &self,
        history: &[Message],
        attachment: Option<&Attachment>,
        chunks: Option<ChunkSender>,
    ) -> Result<String, GatewayError>;
}

/// Uniform entry point over the provider adapters.
///
/// Holds shared settings explicitly (no ambient singletons); selection
/// happens per call so a settings change applies to the next send. Pure
/// dispatch: persistence is the caller's responsibility.
pub struct Gateway {
    settings: Arc<RwLock<Settings>>,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    ollama: Arc<OllamaAdapter>,
    images: Arc<dyn ImageFetcher>,
}

impl Gateway {
    /// Create a gateway with the three stock adapters and an HTTP image
    /// fetcher.
    pub fn new(settings: Arc<RwLock<Settings>>) -> Self {
        let ollama = Arc::new(OllamaAdapter::new());
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            ollama.clone(),
            Arc::new(GeminiAdapter::new()),
            Arc::new(OpenRouterAdapter::new()),
        ];
        Self {
            settings,
            adapters,
            ollama,
            images: Arc::new(HttpImageFetcher::new()),
        }
    }

    /// Replace the image fetch collaborator.
    pub fn with_image_fetcher(mut self, images: Arc<dyn ImageFetcher>) -> Self {
        self.images = images;
        self
    }

    /// Replace the adapter registry.
    pub fn with_adapters(mut self, adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        self.adapters = adapters;
        self
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    /// List models installed on the local runtime.
    pub async fn list_local_models(&self) -> Result<Vec<String>, GatewayError> {
        let base_url = self.settings.read().ollama_url.clone();
        self.ollama.list_models(&base_url).await
    }

    /// Answer one completion request through the configured provider.
    ///
    /// Credential preconditions are checked before any network or attachment
    /// work; adapters that do not stream ignore `chunks` silently.
    pub async fn complete(
        &self,
        history: &[Message],
        attachment: Option<&Attachment>,
        chunks: Option<ChunkSender>,
    ) -> Result<String, GatewayError> {
        let settings = self.settings();
        let provider: ProviderId = settings
            .provider
            .parse()
            .map_err(|_| GatewayError::UnknownProvider(settings.provider.clone()))?;
        let config = settings.provider_config(provider);
        if provider != ProviderId::Ollama && config.api_key.is_none() {
            return Err(GatewayError::Config(missing_key_message(provider)));
        }
        let adapter = self
            .adapters
            .iter()
            .find(|adapter| adapter.id() == provider)
            .ok_or_else(|| GatewayError::UnknownProvider(provider.to_string()))?;

        let effective = attachment.or_else(|| {
            history.last().and_then(|message| message.attachment.as_ref())
        });
        let image = match effective {
            Some(Attachment::Image { url, mimetype, .. }) => {
                Some(self.images.fetch_base64(url, mimetype.as_deref()).await?)
            }
            _ => None,
        };

        let folded = prompt::fold_document(history, attachment);
        info!(
            "completing request (provider={}, model={}, messages={}, streaming={})",
            provider,
            config.model,
            folded.len(),
            chunks.is_some()
        );
        let answer = adapter
            .send(&config, &folded, image.as_ref(), chunks.as_ref())
            .await?;
        debug!("completion finished (provider={}, answer_len={})", provider, answer.len());
        Ok(answer)
    }
}

#[async_trait]
impl Completer for Gateway {
    async fn complete(
        &self,
        history: &[Message],
        attachment: Option<&Attachment>,
        chunks: Option<ChunkSender>,
    ) -> Result<String, GatewayError> {
        Gateway::complete(self, history, attachment, chunks).await
    }
}

fn missing_key_message(provider: ProviderId) -> String {
    match provider {
        ProviderId::Gemini => "Gemini API key not configured".to_string(),
        ProviderId::OpenRouter => "OpenRouter API key not configured".to_string(),
        ProviderId::Ollama => "Ollama requires no API key".to_string(),
    }
}

/// Provider-specific remediation guidance appended to user-facing failures.
pub fn remediation_hint(provider: ProviderId, settings: &Settings) -> String {
    match provider {
        ProviderId::Ollama => format!(
            "Make sure:\n1. Ollama is running (ollama serve)\n2. URL is correct: {}\n3. Model is installed: ollama pull {}",
            settings.ollama_url, settings.model_name
        ),
        ProviderId::Gemini => format!(
            "Make sure:\n1. Gemini API key is valid\n2. You haven't exceeded your quota\n3. Model is available: {}\n4. Try again in a few moments if the model is overloaded",
            settings.gemini_model
        ),
        ProviderId::OpenRouter => format!(
            "Make sure:\n1. OpenRouter API key is valid\n2. You have credits available\n3. Model is available: {}",
            settings.openrouter_model
        ),
    }
}
