//! Error taxonomy for gateway and adapter operations.

use thiserror::Error;

/// Errors returned by the gateway and provider adapters.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Required credential or provider setting is missing. Surfaced before
    /// any network call; never retried.
    #[error("provider not configured: {0}")]
    Config(String),
    /// Non-2xx HTTP response from a provider.
    #[error("provider error {status}: {body}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Response body, for remediation messages.
        body: String,
    },
    /// Content-policy rejection, distinct from a generic provider failure.
    #[error("content blocked: {reason}")]
    Blocked {
        /// Block reason reported by the provider.
        reason: String,
    },
    /// The configured provider identifier matches no known adapter.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    /// Image fetch or document context preparation failed; the send is
    /// aborted before any provider call.
    #[error("attachment processing failed: {0}")]
    Attachment(String),
    /// Transport-level failure from the HTTP client.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// A provider response body did not decode.
    #[error("malformed provider response: {0}")]
    Decode(#[from] serde_json::Error),
}
