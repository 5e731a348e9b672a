//! Ollama backend using the local `/api/generate` endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::backends::{error_for_status, ProviderKind};
use crate::config::LlmConfig;
use crate::error::RenameError;
use crate::llm::parse::parse_rename_response;
use crate::llm::{LLMRenameResponse, SuggestionProvider, SuggestionRequest};

/// Client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    config: Arc<LlmConfig>,
    client: Client,
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    /// Constrains output to a JSON object
    format: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<&'a str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaBackend {
    pub fn new(config: Arc<LlmConfig>, client: Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl SuggestionProvider for OllamaBackend {
    async fn get_suggestion(
        &self,
        request: &SuggestionRequest,
    ) -> Result<LLMRenameResponse, RenameError> {
        let body = OllamaGenerateRequest {
            model: &self.config.model,
            system: &request.system_prompt,
            prompt: &request.user_prompt,
            stream: false,
            format: "json",
            images: request.images.iter().map(|i| i.data.as_str()).collect(),
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };
        log::debug!(
            "Ollama generate: model={} images={}",
            self.config.model,
            body.images.len()
        );

        let response = self
            .client
            .post(self.endpoint("/api/generate"))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(ProviderKind::Ollama, status, body));
        }

        let parsed: OllamaGenerateResponse = response.json().await?;
        log::trace!("Ollama raw response: {}", parsed.response);
        parse_rename_response(&parsed.response)
    }

    async fn health_check(&self) -> Result<(), RenameError> {
        let response = self.client.get(self.endpoint("/api/tags")).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(ProviderKind::Ollama, status, body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_without_empty_images() {
        let body = OllamaGenerateRequest {
            model: "llava:latest",
            system: "sys",
            prompt: "user",
            stream: false,
            format: "json",
            images: Vec::new(),
            options: OllamaOptions {
                temperature: 0.3,
                num_predict: 500,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("images").is_none());
        assert_eq!(json["format"], "json");
        assert_eq!(json["options"]["num_predict"], 500);
    }

    #[test]
    fn endpoint_handles_trailing_slash() {
        let config = LlmConfig {
            api_base: "http://localhost:11434/".to_string(),
            ..Default::default()
        };
        let backend = OllamaBackend::new(Arc::new(config), Client::new());
        assert_eq!(
            backend.endpoint("/api/generate"),
            "http://localhost:11434/api/generate"
        );
    }
}
