//! Validated rename suggestion returned by a provider.

use serde::{Deserialize, Serialize};

use crate::error::RenameError;

const MAX_NAME_CHARS: usize = 200;
const MAX_REASONING_CHARS: usize = 500;
const MAX_TAGS: usize = 10;
const MAX_TAG_CHARS: usize = 50;

const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Raw deserialized shape, before validation.
#[derive(Debug, Deserialize)]
pub(crate) struct RawRenameResponse {
    pub suggested_name: String,
    #[serde(default)]
    pub reasoning: String,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A provider's rename suggestion after validation and normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LLMRenameResponse {
    /// Proposed base name, without extension
    pub suggested_name: String,
    pub reasoning: String,
    /// Provider self-assessment in `0.0..=1.0`
    pub confidence: f64,
    /// Suggested Finder tags
    pub tags: Vec<String>,
}

impl LLMRenameResponse {
    /// Validates and normalizes a raw response.
    ///
    /// Strips wrapping quotes and backticks from the name, truncates the
    /// reasoning and tags to their limits, and clamps confidence. An empty
    /// or oversized name is rejected.
    pub(crate) fn from_raw(raw: RawRenameResponse) -> Result<Self, RenameError> {
        let suggested_name = strip_wrapping(raw.suggested_name.trim()).to_string();
        if suggested_name.is_empty() {
            return Err(RenameError::ResponseFormatError {
                message: "suggested_name is empty".to_string(),
                raw_response: String::new(),
            });
        }
        if suggested_name.chars().count() > MAX_NAME_CHARS {
            return Err(RenameError::ResponseFormatError {
                message: format!("suggested_name exceeds {MAX_NAME_CHARS} characters"),
                raw_response: String::new(),
            });
        }

        let confidence = match raw.confidence {
            Some(value) if value.is_finite() => value.clamp(0.0, 1.0),
            _ => DEFAULT_CONFIDENCE,
        };

        let tags: Vec<String> = raw
            .tags
            .into_iter()
            .map(|tag| truncate_chars(tag.trim(), MAX_TAG_CHARS))
            .filter(|tag| !tag.is_empty())
            .take(MAX_TAGS)
            .collect();

        Ok(Self {
            suggested_name,
            reasoning: truncate_chars(raw.reasoning.trim(), MAX_REASONING_CHARS),
            confidence,
            tags,
        })
    }
}

/// Removes one matching pair of wrapping quotes or backticks.
fn strip_wrapping(name: &str) -> &str {
    for wrapper in ['"', '\'', '`'] {
        if name.len() >= 2 && name.starts_with(wrapper) && name.ends_with(wrapper) {
            return name[1..name.len() - 1].trim();
        }
    }
    name
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str) -> RawRenameResponse {
        RawRenameResponse {
            suggested_name: name.to_string(),
            reasoning: "because".to_string(),
            confidence: Some(0.9),
            tags: vec!["Photograph".to_string()],
        }
    }

    #[test]
    fn strips_wrapping_quotes_and_backticks() {
        let response = LLMRenameResponse::from_raw(raw("\"beach-sunset\"")).unwrap();
        assert_eq!(response.suggested_name, "beach-sunset");
        let response = LLMRenameResponse::from_raw(raw("`beach-sunset`")).unwrap();
        assert_eq!(response.suggested_name, "beach-sunset");
    }

    #[test]
    fn rejects_empty_name() {
        assert!(LLMRenameResponse::from_raw(raw("  ")).is_err());
        assert!(LLMRenameResponse::from_raw(raw("\"\"")).is_err());
    }

    #[test]
    fn rejects_oversized_name() {
        assert!(LLMRenameResponse::from_raw(raw(&"x".repeat(201))).is_err());
    }

    #[test]
    fn missing_confidence_defaults_and_clamps() {
        let mut input = raw("name");
        input.confidence = None;
        assert_eq!(LLMRenameResponse::from_raw(input).unwrap().confidence, 0.8);

        let mut input = raw("name");
        input.confidence = Some(3.0);
        assert_eq!(LLMRenameResponse::from_raw(input).unwrap().confidence, 1.0);
    }

    #[test]
    fn tags_are_trimmed_capped_and_truncated() {
        let mut input = raw("name");
        input.tags = (0..15).map(|i| format!("  tag-{i}  ")).collect();
        input.tags.push(String::new());
        let response = LLMRenameResponse::from_raw(input).unwrap();
        assert_eq!(response.tags.len(), 10);
        assert_eq!(response.tags[0], "tag-0");

        let mut input = raw("name");
        input.tags = vec!["y".repeat(80)];
        let response = LLMRenameResponse::from_raw(input).unwrap();
        assert_eq!(response.tags[0].len(), 50);
    }

    #[test]
    fn reasoning_is_truncated() {
        let mut input = raw("name");
        input.reasoning = "r".repeat(600);
        let response = LLMRenameResponse::from_raw(input).unwrap();
        assert_eq!(response.reasoning.chars().count(), 500);
    }
}
