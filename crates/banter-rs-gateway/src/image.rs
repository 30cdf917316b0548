//! Image fetch-to-base64 collaborator boundary.

use crate::GatewayError;
use crate::adapter::ImagePayload;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::debug;

/// Mime used when neither the attachment nor the response names one.
const FALLBACK_MIME: &str = "image/png";

/// Resolves an uploaded image URL into base64 payload data.
///
/// Failures abort the send before any provider call is made; a request known
/// to be missing required context is never dispatched.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the image behind `url` and encode it, preferring `mime_hint`
    /// over whatever the transport reports.
    async fn fetch_base64(
        &self,
        url: &str,
        mime_hint: Option<&str>,
    ) -> Result<ImagePayload, GatewayError>;
}

/// [`ImageFetcher`] that pulls bytes over HTTP.
#[derive(Debug, Default)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Create a fetcher with a fresh HTTP client.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_base64(
        &self,
        url: &str,
        mime_hint: Option<&str>,
    ) -> Result<ImagePayload, GatewayError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| GatewayError::Attachment(format!("image fetch failed: {err}")))?;
        if !response.status().is_success() {
            return Err(GatewayError::Attachment(format!(
                "image fetch failed: status {}",
                response.status()
            )));
        }
        let mime = mime_hint
            .map(str::to_string)
            .or_else(|| {
                response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| FALLBACK_MIME.to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|err| GatewayError::Attachment(format!("image read failed: {err}")))?;
        debug!("fetched image for encoding (url={}, bytes={})", url, bytes.len());
        Ok(ImagePayload {
            data: STANDARD.encode(&bytes),
            mime,
        })
    }
}
