//! OpenRouter adapter: structured turn list, chat-completions style, atomic.

use crate::GatewayError;
use crate::adapter::{ChunkSender, ImagePayload, ProviderAdapter, ensure_success};
use async_trait::async_trait;
use banter_rs_config::{ProviderConfig, ProviderId};
use banter_rs_protocol::{Message, Role};
use log::debug;
use serde::{Deserialize, Serialize};

const NO_RESPONSE: &str = "No response";
const MAX_TOKENS: u32 = 8192;
/// Referer/title identification OpenRouter asks proxy clients to send.
const APP_REFERER: &str = "https://github.com/banter-ai/banter";
const APP_TITLE: &str = "Banter";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, PartialEq)]
struct ChatTurn {
    role: &'static str,
    content: TurnContent,
}

/// Turn content is a plain string for text-only turns and a part array only
/// for the single turn that carries an image.
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
enum TurnContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize, PartialEq)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn role_to_wire(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Convert the history into wire turns. With an image, only the last user
/// turn is restructured into a part array; every other turn stays a plain
/// string.
fn build_turns(history: &[Message], image: Option<&ImagePayload>) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = history
        .iter()
        .map(|message| ChatTurn {
            role: role_to_wire(message.role),
            content: TurnContent::Text(message.content.clone()),
        })
        .collect();

    if let Some(payload) = image
        && let Some(position) = history.iter().rposition(|message| message.role == Role::User)
    {
        turns[position].content = TurnContent::Parts(vec![
            ContentPart::Text {
                text: history[position].content.clone(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: payload.to_data_uri(),
                },
            },
        ]);
    }
    turns
}

fn extract_answer(response: ChatResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_else(|| NO_RESPONSE.to_string())
}

/// Adapter for the hosted OpenRouter chat-completions proxy.
#[derive(Debug, Default)]
pub struct OpenRouterAdapter {
    client: reqwest::Client,
}

impl OpenRouterAdapter {
    /// Create an adapter with a fresh HTTP client.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProviderAdapter for OpenRouterAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::OpenRouter
    }

    async fn send(
        &self,
        config: &ProviderConfig,
        history: &[Message],
        image: Option<&ImagePayload>,
        _chunks: Option<&ChunkSender>,
    ) -> Result<String, GatewayError> {
        let api_key = config.api_key.as_deref().ok_or_else(|| {
            GatewayError::Config("OpenRouter API key not configured".to_string())
        })?;
        let request = ChatRequest {
            model: &config.model,
            messages: build_turns(history, image),
            temperature: config.temperature,
            max_tokens: MAX_TOKENS,
        };
        debug!(
            "dispatching openrouter request (model={}, turns={}, with_image={})",
            config.model,
            request.messages.len(),
            image.is_some()
        );
        let response = self
            .client
            .post(&config.endpoint)
            .bearer_auth(api_key)
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body: ChatResponse = response.json().await?;
        Ok(extract_answer(body))
    }
}

#[cfg(test)]
mod tests {
    use super::{ChatResponse, build_turns, extract_answer};
    use crate::adapter::ImagePayload;
    use banter_rs_protocol::{Message, Role};
    use pretty_assertions::assert_eq;

    fn history() -> Vec<Message> {
        vec![
            Message::new(Role::User, "first", None),
            Message::new(Role::Assistant, "reply", None),
            Message::new(Role::User, "look at this", None),
        ]
    }

    #[test]
    fn turns_mirror_history_without_an_image() {
        let turns = build_turns(&history(), None);
        let value = serde_json::to_value(&turns).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!([
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "reply"},
                {"role": "user", "content": "look at this"}
            ])
        );
    }

    #[test]
    fn only_the_last_user_turn_carries_the_image() {
        let image = ImagePayload {
            data: "QUJD".to_string(),
            mime: "image/png".to_string(),
        };
        let turns = build_turns(&history(), Some(&image));
        let value = serde_json::to_value(&turns).expect("serialize");
        // Earlier turns stay plain strings.
        assert_eq!(value[0]["content"], "first");
        assert_eq!(value[1]["content"], "reply");
        let parts = value[2]["content"].as_array().expect("parts");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], serde_json::json!({"type": "text", "text": "look at this"}));
        assert_eq!(
            parts[1],
            serde_json::json!({
                "type": "image_url",
                "image_url": {"url": "data:image/png;base64,QUJD"}
            })
        );
    }

    #[test]
    fn image_targets_last_user_turn_even_when_assistant_spoke_last() {
        let mut messages = history();
        messages.push(Message::new(Role::Assistant, "trailing", None));
        let image = ImagePayload {
            data: "QUJD".to_string(),
            mime: "image/png".to_string(),
        };
        let turns = build_turns(&messages, Some(&image));
        let value = serde_json::to_value(&turns).expect("serialize");
        assert!(value[2]["content"].is_array());
        assert_eq!(value[3]["content"], "trailing");
    }

    #[test]
    fn answer_comes_from_first_choice_with_fallback() {
        let body = r#"{"choices": [{"message": {"content": "hi"}}]}"#;
        let response: ChatResponse = serde_json::from_str(body).expect("decode");
        assert_eq!(extract_answer(response), "hi");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).expect("decode");
        assert_eq!(extract_answer(empty), "No response");
    }
}
