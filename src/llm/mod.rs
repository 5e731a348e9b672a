//! Provider-agnostic LLM surface: the suggestion trait, the dispatching
//! client, and response parsing.

pub mod parse;
pub mod response;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::backends::anthropic::AnthropicBackend;
use crate::backends::ollama::OllamaBackend;
use crate::backends::openai::OpenAiCompatBackend;
use crate::backends::{ImagePayload, ProviderKind};
use crate::config::LlmConfig;
use crate::error::RenameError;

pub use response::LLMRenameResponse;

/// One fully-rendered request: prompts plus any image payloads.
#[derive(Debug, Clone)]
pub struct SuggestionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub images: Vec<ImagePayload>,
}

/// Anything that can turn a rendered request into a rename suggestion.
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Requests a rename suggestion for one file.
    async fn get_suggestion(
        &self,
        request: &SuggestionRequest,
    ) -> Result<LLMRenameResponse, RenameError>;

    /// Verifies the provider is reachable and accepts our credentials.
    async fn health_check(&self) -> Result<(), RenameError>;
}

/// Configured client for the selected provider.
#[derive(Debug)]
pub enum LLMClient {
    Ollama(OllamaBackend),
    OpenAiCompat(OpenAiCompatBackend),
    Anthropic(AnthropicBackend),
}

impl LLMClient {
    /// Builds the backend selected by `config.provider`.
    ///
    /// Fails when a key-requiring provider has no API key configured.
    pub fn from_config(config: &LlmConfig) -> Result<Self, RenameError> {
        if config.provider.requires_api_key()
            && config.api_key.as_deref().unwrap_or("").is_empty()
        {
            return Err(RenameError::AuthError(format!(
                "API key required for {} (set {})",
                config.provider,
                config.provider.api_key_env_var().unwrap_or("an API key"),
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let config = Arc::new(config.clone());

        Ok(match config.provider {
            ProviderKind::Ollama => LLMClient::Ollama(OllamaBackend::new(config, client)),
            ProviderKind::Anthropic => {
                LLMClient::Anthropic(AnthropicBackend::new(config, client))
            }
            kind @ (ProviderKind::OpenAI | ProviderKind::LmStudio | ProviderKind::OpenRouter) => {
                LLMClient::OpenAiCompat(OpenAiCompatBackend::new(kind, config, client))
            }
        })
    }
}

#[async_trait]
impl SuggestionProvider for LLMClient {
    async fn get_suggestion(
        &self,
        request: &SuggestionRequest,
    ) -> Result<LLMRenameResponse, RenameError> {
        match self {
            LLMClient::Ollama(backend) => backend.get_suggestion(request).await,
            LLMClient::OpenAiCompat(backend) => backend.get_suggestion(request).await,
            LLMClient::Anthropic(backend) => backend.get_suggestion(request).await,
        }
    }

    async fn health_check(&self) -> Result<(), RenameError> {
        match self {
            LLMClient::Ollama(backend) => backend.health_check().await,
            LLMClient::OpenAiCompat(backend) => backend.health_check().await,
            LLMClient::Anthropic(backend) => backend.health_check().await,
        }
    }
}
