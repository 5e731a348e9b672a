//! Provider backends and the shared provider model.

pub mod anthropic;
pub mod ollama;
pub mod openai;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{ImageMode, LlmConfig};
use crate::error::RenameError;
use crate::media;
use crate::metadata::FileMetadata;

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenAI,
    Anthropic,
    LmStudio,
    OpenRouter,
}

impl ProviderKind {
    /// Environment variable consulted for this provider's API key.
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAI => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::OpenRouter => Some("OPENROUTER_API_KEY"),
            ProviderKind::Ollama | ProviderKind::LmStudio => None,
        }
    }

    /// Whether requests must carry an API key.
    pub fn requires_api_key(&self) -> bool {
        self.api_key_env_var().is_some()
    }

    /// Default API base URL for this provider.
    pub fn default_api_base(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "http://localhost:11434",
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::LmStudio => "http://localhost:1234/v1",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }

    /// Model-name fragments known to be vision-capable on this provider.
    pub fn known_vision_models(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenAI => &["gpt-4o", "gpt-4-turbo", "gpt-4.1", "gpt-5", "o1", "o3"],
            ProviderKind::Anthropic => &["claude-3", "claude-sonnet", "claude-opus", "claude-haiku"],
            ProviderKind::OpenRouter => &["gpt-4o", "claude-3", "claude-sonnet", "gemini"],
            ProviderKind::Ollama | ProviderKind::LmStudio => &[],
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::LmStudio => "lmstudio",
            ProviderKind::OpenRouter => "openrouter",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ProviderKind {
    type Err = RenameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" => Ok(ProviderKind::OpenAI),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "lmstudio" | "lm-studio" => Ok(ProviderKind::LmStudio),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            other => Err(RenameError::InvalidRequest(format!(
                "Unknown provider: {other}"
            ))),
        }
    }
}

/// One base64-encoded image attached to a request.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub data: String,
    pub media_type: &'static str,
}

/// Collects image payloads for a file according to the configured image
/// mode: the file itself for images, extracted frames for videos.
///
/// Encoding or extraction failures degrade to fewer (possibly zero)
/// payloads rather than failing the request.
pub async fn gather_images(metadata: &FileMetadata, config: &LlmConfig) -> Vec<ImagePayload> {
    let vision_capable = media::model_supports_vision(
        &config.model,
        config.provider.known_vision_models(),
    );
    let send_images = match config.image_mode {
        ImageMode::Base64 => true,
        ImageMode::Native | ImageMode::Auto => vision_capable,
    };
    if !send_images {
        if metadata.image.is_some() || metadata.video.is_some() {
            log::debug!(
                "Model {} not detected as vision-capable; sending text-only prompt",
                config.model
            );
        }
        return Vec::new();
    }

    if media::is_image_file(&metadata.extension) {
        match media::encode_image(&metadata.file_path).await {
            Ok((data, media_type)) => return vec![ImagePayload { data, media_type }],
            Err(err) => {
                log::warn!("Cannot encode {}: {err}", metadata.file_path.display());
                return Vec::new();
            }
        }
    }

    if media::is_video_file(&metadata.extension) && metadata.video_extract_count > 0 {
        let duration = metadata.video.as_ref().and_then(|v| v.duration_seconds);
        return media::extract_video_frames(
            &metadata.file_path,
            metadata.video_extract_count,
            duration,
        )
        .await
        .into_iter()
        .map(|data| ImagePayload {
            data,
            media_type: "image/jpeg",
        })
        .collect();
    }

    Vec::new()
}

/// Maps a non-success HTTP response to a provider error.
pub(crate) fn error_for_status(
    provider: ProviderKind,
    status: reqwest::StatusCode,
    body: String,
) -> RenameError {
    match status.as_u16() {
        401 | 403 => RenameError::AuthError(format!("{provider} rejected the API key: {body}")),
        _ => RenameError::ProviderError(format!("{provider} returned {status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_from_string() {
        assert_eq!(
            "Anthropic".parse::<ProviderKind>().unwrap(),
            ProviderKind::Anthropic
        );
        assert_eq!(
            "lm-studio".parse::<ProviderKind>().unwrap(),
            ProviderKind::LmStudio
        );
        assert!("gemini".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&ProviderKind::OpenRouter).unwrap(),
            "\"openrouter\""
        );
        let kind: ProviderKind = serde_json::from_str("\"lmstudio\"").unwrap();
        assert_eq!(kind, ProviderKind::LmStudio);
    }

    #[test]
    fn key_requirements_follow_provider() {
        assert!(ProviderKind::OpenAI.requires_api_key());
        assert!(!ProviderKind::Ollama.requires_api_key());
        assert_eq!(
            ProviderKind::Anthropic.api_key_env_var(),
            Some("ANTHROPIC_API_KEY")
        );
    }

    #[test]
    fn auth_status_maps_to_auth_error() {
        let err = error_for_status(
            ProviderKind::OpenAI,
            reqwest::StatusCode::UNAUTHORIZED,
            "bad key".to_string(),
        );
        assert!(matches!(err, RenameError::AuthError(_)));

        let err = error_for_status(
            ProviderKind::Ollama,
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "boom".to_string(),
        );
        assert!(matches!(err, RenameError::ProviderError(_)));
    }
}
