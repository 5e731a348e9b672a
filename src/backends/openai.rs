//! OpenAI-compatible chat-completions backend.
//!
//! Serves OpenAI itself plus LM Studio and OpenRouter, which expose the
//! same wire format behind different base URLs and auth requirements.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::backends::{error_for_status, ProviderKind};
use crate::config::LlmConfig;
use crate::error::RenameError;
use crate::llm::parse::parse_rename_response;
use crate::llm::{LLMRenameResponse, SuggestionProvider, SuggestionRequest};

/// Client for any chat-completions style API.
#[derive(Debug, Clone)]
pub struct OpenAiCompatBackend {
    kind: ProviderKind,
    config: Arc<LlmConfig>,
    client: Client,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiCompatBackend {
    pub fn new(kind: ProviderKind, config: Arc<LlmConfig>, client: Client) -> Self {
        Self {
            kind,
            config,
            client,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    fn apply_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request;
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }
        if self.kind == ProviderKind::OpenRouter {
            request = request
                .header("HTTP-Referer", "https://github.com/namewise/namewise")
                .header("X-Title", "namewise");
        }
        request
    }
}

#[async_trait]
impl SuggestionProvider for OpenAiCompatBackend {
    async fn get_suggestion(
        &self,
        request: &SuggestionRequest,
    ) -> Result<LLMRenameResponse, RenameError> {
        let user_content = if request.images.is_empty() {
            MessageContent::Text(&request.user_prompt)
        } else {
            let mut parts = vec![ContentPart::Text {
                text: &request.user_prompt,
            }];
            parts.extend(request.images.iter().map(|image| ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{}", image.media_type, image.data),
                },
            }));
            MessageContent::Parts(parts)
        };

        // Only OpenAI reliably honors response_format across models.
        let response_format = (self.kind == ProviderKind::OpenAI).then_some(ResponseFormat {
            format_type: "json_object",
        });
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(&request.system_prompt),
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
            response_format,
        };
        log::debug!(
            "{} chat completion: model={} images={}",
            self.kind,
            self.config.model,
            request.images.len()
        );

        let response = self
            .apply_headers(self.client.post(self.endpoint("/chat/completions")))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(self.kind, status, body));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| RenameError::ResponseFormatError {
                message: format!("{} returned no choices", self.kind),
                raw_response: String::new(),
            })?;
        log::trace!("{} raw response: {content}", self.kind);
        parse_rename_response(content)
    }

    async fn health_check(&self) -> Result<(), RenameError> {
        let response = self
            .apply_headers(self.client.get(self.endpoint("/models")))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(self.kind, status, body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::ImagePayload;

    #[test]
    fn text_only_message_serializes_as_string() {
        let message = ChatMessage {
            role: "user",
            content: MessageContent::Text("name this file"),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["content"], "name this file");
    }

    #[test]
    fn image_parts_serialize_as_data_urls() {
        let image = ImagePayload {
            data: "AAAA".to_string(),
            media_type: "image/png",
        };
        let part = ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:{};base64,{}", image.media_type, image.data),
            },
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "image_url");
        assert_eq!(json["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn choice_content_deserializes() {
        let raw = r#"{"choices": [{"message": {"role": "assistant", "content": "{}"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("{}"));
    }
}
