//! Provider adapter boundary.

use crate::GatewayError;
use async_trait::async_trait;
use banter_rs_config::{ProviderConfig, ProviderId};
use banter_rs_protocol::Message;
use tokio::sync::mpsc;

/// Channel end that receives incremental response chunks, in arrival order.
///
/// Dropping the receiving half closes the channel; a streaming adapter treats
/// that as cancellation and stops reading the response body.
pub type ChunkSender = mpsc::UnboundedSender<String>;

/// Base64-encoded image ready for a provider payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Base64 image data (no data-URI prefix).
    pub data: String,
    /// Mime type for the data.
    pub mime: String,
}

impl ImagePayload {
    /// Render the payload as a `data:` URI, the shape chat-completions
    /// style APIs take for inline images.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.data)
    }
}

/// Translation layer between the normalized request and one provider's wire
/// protocol.
///
/// Implementations return the final response text; streaming implementations
/// additionally forward each chunk through `chunks` before returning.
/// Adapters without streaming support ignore `chunks` silently, so callers
/// can pass a uniform sender regardless of provider.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider this adapter speaks for.
    fn id(&self) -> ProviderId;

    /// Dispatch one completion request.
    async fn send(
        &self,
        config: &ProviderConfig,
        history: &[Message],
        image: Option<&ImagePayload>,
        chunks: Option<&ChunkSender>,
    ) -> Result<String, GatewayError>;
}

/// Map a non-2xx response into [`GatewayError::Provider`], passing 2xx through.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Provider {
        status: status.as_u16(),
        body,
    })
}
