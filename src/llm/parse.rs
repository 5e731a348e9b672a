//! Tolerant parsing of provider output into a rename suggestion.
//!
//! Models frequently wrap JSON in markdown fences, prepend prose, or emit
//! minor syntax slips such as trailing commas. Parsing tries progressively
//! looser strategies before giving up.

use crate::error::RenameError;
use crate::llm::response::{LLMRenameResponse, RawRenameResponse};

/// Parses provider output into a validated [`LLMRenameResponse`].
///
/// Tries, in order: the raw text as JSON, the content of a markdown code
/// fence, the first balanced `{...}` object, then the same candidates with
/// trailing-comma repair applied.
pub fn parse_rename_response(raw: &str) -> Result<LLMRenameResponse, RenameError> {
    let mut candidates: Vec<String> = vec![raw.trim().to_string()];
    if let Some(fenced) = strip_code_fence(raw) {
        candidates.push(fenced);
    }
    if let Some(object) = extract_balanced_object(raw) {
        candidates.push(object);
    }
    let repaired: Vec<String> = candidates.iter().map(|c| repair_json(c)).collect();
    candidates.extend(repaired);

    for candidate in &candidates {
        if let Ok(parsed) = serde_json::from_str::<RawRenameResponse>(candidate) {
            return LLMRenameResponse::from_raw(parsed).map_err(|err| match err {
                RenameError::ResponseFormatError { message, .. } => {
                    RenameError::ResponseFormatError {
                        message,
                        raw_response: raw.to_string(),
                    }
                }
                other => other,
            });
        }
    }

    Err(RenameError::ResponseFormatError {
        message: "no JSON object with a suggested_name found".to_string(),
        raw_response: raw.to_string(),
    })
}

/// Returns the body of the first markdown code fence, if any.
fn strip_code_fence(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag on the fence line.
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim().to_string())
}

/// Extracts the first balanced `{...}` object, respecting string literals.
fn extract_balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Removes trailing commas before closing brackets, outside of strings.
fn repair_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '}' | ']' => {
                while out.ends_with(|c: char| c.is_whitespace()) {
                    out.pop();
                }
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}
