//! Settings schema for Banter.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default Ollama endpoint.
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// Default Gemini API base.
const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default OpenRouter chat-completions endpoint.
const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Identifier for a known provider backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Local Ollama runtime; the only provider with token streaming.
    Ollama,
    /// Hosted Gemini generateContent API.
    Gemini,
    /// Hosted OpenRouter chat-completions proxy.
    OpenRouter,
}

impl ProviderId {
    /// Return the provider id as its settings string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Ollama => "ollama",
            ProviderId::Gemini => "gemini",
            ProviderId::OpenRouter => "openrouter",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ollama" => Ok(ProviderId::Ollama),
            "gemini" => Ok(ProviderId::Gemini),
            "openrouter" => Ok(ProviderId::OpenRouter),
            other => Err(ConfigError::Invalid(format!("unknown provider: {other}"))),
        }
    }
}

/// Effective configuration for one provider call.
///
/// Exactly one of these is active per request, derived from [`Settings`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Which backend this config targets.
    pub provider: ProviderId,
    /// Base endpoint URL for the backend.
    pub endpoint: String,
    /// Credential for hosted backends; `None` for the local runtime.
    pub api_key: Option<String>,
    /// Model identifier to request.
    pub model: String,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
}

/// User-facing settings, merged from layered sources.
///
/// `provider` stays a free-form string so an unrecognized value survives the
/// decode and can be rejected per call instead of failing the whole load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Active provider selection ("ollama", "gemini", "openrouter").
    pub provider: String,
    /// Ollama endpoint URL.
    pub ollama_url: String,
    /// Ollama model name.
    pub model_name: String,
    /// Gemini credential; a secrets layer may override this.
    pub gemini_api_key: String,
    /// Gemini model name.
    pub gemini_model: String,
    /// Gemini API base URL.
    pub gemini_url: String,
    /// OpenRouter credential; a secrets layer may override this.
    pub openrouter_api_key: String,
    /// OpenRouter model name.
    pub openrouter_model: String,
    /// OpenRouter chat-completions endpoint URL.
    pub openrouter_url: String,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderId::Ollama.as_str().to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model_name: "llama3.2:3b".to_string(),
            gemini_api_key: String::new(),
            gemini_model: "gemini-2.5-pro".to_string(),
            gemini_url: DEFAULT_GEMINI_URL.to_string(),
            openrouter_api_key: String::new(),
            openrouter_model: "anthropic/claude-3-opus".to_string(),
            openrouter_url: DEFAULT_OPENROUTER_URL.to_string(),
            temperature: 0.7,
        }
    }
}

/// Settings fields that hold credentials; only these accept secret overrides.
pub const CREDENTIAL_FIELDS: &[&str] = &["gemini_api_key", "openrouter_api_key"];

impl Settings {
    /// Parse the active provider selection.
    pub fn active_provider(&self) -> Result<ProviderId, ConfigError> {
        self.provider.parse()
    }

    /// Build the effective config for one provider.
    pub fn provider_config(&self, provider: ProviderId) -> ProviderConfig {
        let (endpoint, api_key, model) = match provider {
            ProviderId::Ollama => (self.ollama_url.clone(), None, self.model_name.clone()),
            ProviderId::Gemini => (
                self.gemini_url.clone(),
                non_empty(&self.gemini_api_key),
                self.gemini_model.clone(),
            ),
            ProviderId::OpenRouter => (
                self.openrouter_url.clone(),
                non_empty(&self.openrouter_api_key),
                self.openrouter_model.clone(),
            ),
        };
        ProviderConfig {
            provider,
            endpoint,
            api_key,
            model,
            temperature: self.temperature,
        }
    }

    /// Model identifier new chats should be stamped with.
    pub fn active_model(&self) -> String {
        match self.active_provider() {
            Ok(provider) => self.provider_config(provider).model,
            Err(_) => self.model_name.clone(),
        }
    }

    /// Validate invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be within [0, 1], got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{ProviderId, Settings};
    use pretty_assertions::assert_eq;

    #[test]
    fn provider_id_round_trips() {
        assert_eq!("ollama".parse::<ProviderId>().expect("id"), ProviderId::Ollama);
        assert_eq!(
            "openrouter".parse::<ProviderId>().expect("id"),
            ProviderId::OpenRouter
        );
        assert!("claude".parse::<ProviderId>().is_err());
        assert_eq!(ProviderId::Gemini.as_str(), "gemini");
    }

    #[test]
    fn provider_config_maps_per_provider_fields() {
        let settings = Settings {
            gemini_api_key: "g-key".to_string(),
            ..Settings::default()
        };

        let ollama = settings.provider_config(ProviderId::Ollama);
        assert_eq!(ollama.endpoint, "http://localhost:11434");
        assert_eq!(ollama.api_key, None);
        assert_eq!(ollama.model, "llama3.2:3b");

        let gemini = settings.provider_config(ProviderId::Gemini);
        assert_eq!(gemini.api_key, Some("g-key".to_string()));
        assert_eq!(gemini.model, "gemini-2.5-pro");

        let openrouter = settings.provider_config(ProviderId::OpenRouter);
        assert_eq!(openrouter.api_key, None);
    }

    #[test]
    fn temperature_outside_range_fails_validation() {
        let settings = Settings {
            temperature: 1.5,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
        assert!(Settings::default().validate().is_ok());
    }
}
