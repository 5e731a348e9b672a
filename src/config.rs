//! Application configuration: LLM provider settings, processing behavior
//! and prompt overrides, persisted as a single JSON document.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backends::ProviderKind;
use crate::case::CaseStyle;
use crate::error::RenameError;

/// How Finder tags are applied to a renamed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TagMode {
    /// Add suggested tags on top of existing tags
    #[default]
    Append,
    /// Clear existing tags first, then add
    Replace,
}

/// How image payloads are sent to the LLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    /// Only send when the model is vision-capable
    Native,
    /// Always send base64 image data
    Base64,
    /// Let vision detection decide
    #[default]
    Auto,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub image_mode: ImageMode,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: "llava:latest".to_string(),
            api_base: "http://localhost:11434".to_string(),
            api_key: None,
            image_mode: ImageMode::Auto,
            temperature: 0.3,
            max_tokens: 500,
            timeout_seconds: 60,
        }
    }
}

/// Processing behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub case_style: CaseStyle,
    pub preserve_extension: bool,
    pub include_date_prefix: bool,
    pub date_format: String,
    pub include_current_filename: bool,
    pub include_parent_folder: bool,
    pub include_neighbor_names: bool,
    pub neighbor_context_count: usize,
    pub folder_context_depth: usize,
    pub include_file_content: bool,
    pub content_max_chars: usize,
    pub video_extract_count: u32,
    pub max_concurrency: usize,
    pub auto_apply_tags: bool,
    pub tag_count: Option<u32>,
    pub tag_prompt: String,
    pub tag_mode: TagMode,
    pub dry_run: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            case_style: CaseStyle::Kebab,
            preserve_extension: true,
            include_date_prefix: false,
            date_format: "%Y-%m-%d".to_string(),
            include_current_filename: true,
            include_parent_folder: false,
            include_neighbor_names: true,
            neighbor_context_count: 3,
            folder_context_depth: 1,
            include_file_content: false,
            content_max_chars: 2000,
            video_extract_count: 3,
            max_concurrency: 1,
            auto_apply_tags: true,
            tag_count: Some(5),
            tag_prompt: String::new(),
            tag_mode: TagMode::Append,
            dry_run: true,
        }
    }
}

impl ProcessingConfig {
    /// Effective concurrency, clamped to the supported 1..=50 range.
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrency.clamp(1, 50)
    }
}

/// Prompt overrides for one role, keyed by file type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSection {
    pub image: Option<String>,
    pub video: Option<String>,
    pub document: Option<String>,
    pub generic: Option<String>,
}

/// Optional system/user prompt overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptOverrides {
    pub system: PromptSection,
    pub user: PromptSection,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub processing: ProcessingConfig,
    pub prompts: PromptOverrides,
    pub confirm_before_apply: bool,
    pub show_reasoning: bool,
    pub show_prompt_preview: bool,
    pub prompt_preview_chars: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            processing: ProcessingConfig::default(),
            prompts: PromptOverrides::default(),
            confirm_before_apply: true,
            show_reasoning: true,
            show_prompt_preview: false,
            prompt_preview_chars: 2000,
        }
    }
}

impl AppConfig {
    /// Returns a copy with the provider API key resolved from stored
    /// references or provider environment variables.
    pub fn with_resolved_api_key(&self) -> Self {
        let mut config = self.clone();
        let stored = config
            .llm
            .api_key
            .as_deref()
            .and_then(resolve_env_reference);
        let from_env = config
            .llm
            .provider
            .api_key_env_var()
            .and_then(|var| std::env::var(var).ok())
            .filter(|v| !v.is_empty());
        config.llm.api_key = stored.or(from_env);
        config
    }
}

/// Resolves `$VAR` / `${VAR}` references; plain values pass through.
fn resolve_env_reference(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(var) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        return std::env::var(var).ok().filter(|v| !v.is_empty());
    }
    if let Some(var) = value.strip_prefix('$') {
        return std::env::var(var).ok().filter(|v| !v.is_empty());
    }
    Some(value.to_string())
}

/// Loads and persists [`AppConfig`] as JSON.
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Store at the platform data directory (`<data>/namewise/config.json`).
    pub fn default_location() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("data"));
        Self::new(base.join("namewise").join("config.json"))
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads the configuration, falling back to defaults when the file is
    /// missing or unparseable.
    pub async fn load(&self) -> AppConfig {
        let raw = match tokio::fs::read_to_string(&self.config_path).await {
            Ok(raw) => raw,
            Err(_) => return AppConfig::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                log::warn!(
                    "Invalid config at {}: {err}; using defaults",
                    self.config_path.display()
                );
                AppConfig::default()
            }
        }
    }

    pub async fn save(&self, config: &AppConfig) -> Result<(), RenameError> {
        if let Some(parent) = self.config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&self.config_path, raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        let config = store.load().await;
        assert_eq!(config.processing.max_concurrency, 1);
        assert_eq!(config.llm.provider, ProviderKind::Ollama);
    }

    #[tokio::test]
    async fn corrupt_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let config = ConfigStore::new(path).load().await;
        assert!(config.processing.preserve_extension);
    }

    #[tokio::test]
    async fn save_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        let mut config = AppConfig::default();
        config.llm.model = "qwen2-vl".to_string();
        config.processing.max_concurrency = 8;
        config.processing.tag_count = None;
        store.save(&config).await.unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded.llm.model, "qwen2-vl");
        assert_eq!(loaded.processing.max_concurrency, 8);
        assert_eq!(loaded.processing.tag_count, None);
    }

    #[test]
    fn concurrency_is_clamped() {
        let mut processing = ProcessingConfig {
            max_concurrency: 500,
            ..Default::default()
        };
        assert_eq!(processing.effective_concurrency(), 50);
        processing.max_concurrency = 0;
        assert_eq!(processing.effective_concurrency(), 1);
    }

    #[test]
    fn env_references_resolve() {
        std::env::set_var("NAMEWISE_TEST_KEY", "sk-test");
        assert_eq!(
            resolve_env_reference("$NAMEWISE_TEST_KEY").as_deref(),
            Some("sk-test")
        );
        assert_eq!(
            resolve_env_reference("${NAMEWISE_TEST_KEY}").as_deref(),
            Some("sk-test")
        );
        assert_eq!(resolve_env_reference("literal").as_deref(), Some("literal"));
    }
}
