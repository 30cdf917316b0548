//! Concrete provider adapters.

mod gemini;
mod ollama;
mod openrouter;

pub use gemini::GeminiAdapter;
pub use ollama::OllamaAdapter;
pub use openrouter::OpenRouterAdapter;
