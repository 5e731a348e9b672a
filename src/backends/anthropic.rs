//! Anthropic Messages API backend.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::backends::{error_for_status, ProviderKind};
use crate::config::LlmConfig;
use crate::error::RenameError;
use crate::llm::parse::parse_rename_response;
use crate::llm::{LLMRenameResponse, SuggestionProvider, SuggestionRequest};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    config: Arc<LlmConfig>,
    client: Client,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    source_type: &'a str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

impl AnthropicBackend {
    pub fn new(config: Arc<LlmConfig>, client: Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/messages",
            self.config.api_base.trim_end_matches('/')
        )
    }

    fn request(&self) -> reqwest::RequestBuilder {
        self.client
            .post(self.endpoint())
            .header("x-api-key", self.config.api_key.as_deref().unwrap_or(""))
            .header("anthropic-version", ANTHROPIC_VERSION)
    }
}

#[async_trait]
impl SuggestionProvider for AnthropicBackend {
    async fn get_suggestion(
        &self,
        request: &SuggestionRequest,
    ) -> Result<LLMRenameResponse, RenameError> {
        // Images lead the content so the model sees them before the task.
        let mut content: Vec<ContentBlock<'_>> = request
            .images
            .iter()
            .map(|image| ContentBlock::Image {
                source: ImageSource {
                    source_type: "base64",
                    media_type: image.media_type,
                    data: &image.data,
                },
            })
            .collect();
        content.push(ContentBlock::Text {
            text: &request.user_prompt,
        });

        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: &request.system_prompt,
            messages: vec![AnthropicMessage {
                role: "user",
                content,
            }],
        };
        log::debug!(
            "Anthropic messages: model={} images={}",
            self.config.model,
            request.images.len()
        );

        let response = self.request().json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(ProviderKind::Anthropic, status, body));
        }

        let parsed: MessagesResponse = response.json().await?;
        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(RenameError::ResponseFormatError {
                message: "Anthropic returned no text content".to_string(),
                raw_response: String::new(),
            });
        }
        log::trace!("Anthropic raw response: {text}");
        parse_rename_response(&text)
    }

    /// Sends a minimal request; a 400 still proves the key and endpoint
    /// work, so only auth and transport failures are reported.
    async fn health_check(&self) -> Result<(), RenameError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: 1,
            temperature: 0.0,
            system: "",
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![ContentBlock::Text { text: "ping" }],
            }],
        };
        let response = self.request().json(&body).send().await?;
        let status = response.status();
        if status.is_success() || status.as_u16() == 400 {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(ProviderKind::Anthropic, status, body))
    }
}
