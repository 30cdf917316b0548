//! Multi-provider completion gateway.
//!
//! Normalizes one chat-completion request (history + optional attachment +
//! streaming preference) into provider wire formats, dispatches it, and
//! normalizes the heterogeneous responses back into one final text. The
//! adapter boundary absorbs the differences between providers that take
//! structured turn lists and providers that take one flattened prompt, and
//! between token streaming and atomic responses.

mod adapter;
mod error;
mod gateway;
mod image;
pub mod prompt;
mod providers;

pub use adapter::{ChunkSender, ImagePayload, ProviderAdapter};
pub use error::GatewayError;
pub use gateway::{Completer, Gateway, remediation_hint};
pub use image::{HttpImageFetcher, ImageFetcher};
pub use providers::{GeminiAdapter, OllamaAdapter, OpenRouterAdapter};
