//! Filename case-style transformation.
//!
//! Splits arbitrary input into word tokens and rejoins them under one of
//! twelve naming conventions.

use serde::{Deserialize, Serialize};

use crate::error::RenameError;

/// Supported filename case conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CaseStyle {
    #[serde(rename = "camelCase")]
    Camel,
    #[serde(rename = "capitalCase")]
    Capital,
    #[serde(rename = "constantCase")]
    Constant,
    #[serde(rename = "dotCase")]
    Dot,
    #[serde(rename = "kebabCase")]
    #[default]
    Kebab,
    #[serde(rename = "noCase")]
    No,
    #[serde(rename = "pascalCase")]
    Pascal,
    #[serde(rename = "pascalSnakeCase")]
    PascalSnake,
    #[serde(rename = "pathCase")]
    Path,
    #[serde(rename = "sentenceCase")]
    Sentence,
    #[serde(rename = "snakeCase")]
    Snake,
    #[serde(rename = "trainCase")]
    Train,
}

impl std::str::FromStr for CaseStyle {
    type Err = RenameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "camelCase" => Ok(CaseStyle::Camel),
            "capitalCase" => Ok(CaseStyle::Capital),
            "constantCase" => Ok(CaseStyle::Constant),
            "dotCase" => Ok(CaseStyle::Dot),
            "kebabCase" => Ok(CaseStyle::Kebab),
            "noCase" => Ok(CaseStyle::No),
            "pascalCase" => Ok(CaseStyle::Pascal),
            "pascalSnakeCase" => Ok(CaseStyle::PascalSnake),
            "pathCase" => Ok(CaseStyle::Path),
            "sentenceCase" => Ok(CaseStyle::Sentence),
            "snakeCase" => Ok(CaseStyle::Snake),
            "trainCase" => Ok(CaseStyle::Train),
            _ => Err(RenameError::InvalidRequest(format!(
                "Unknown case style: {s}"
            ))),
        }
    }
}

/// Transforms `name` into the requested case style.
///
/// Input with no recognizable word tokens is returned unchanged.
pub fn transform(name: &str, style: CaseStyle) -> String {
    let words = split_words(name);
    if words.is_empty() {
        return name.to_string();
    }

    match style {
        CaseStyle::Camel => {
            let mut out = words[0].to_lowercase();
            for word in &words[1..] {
                out.push_str(&capitalize(word));
            }
            out
        }
        CaseStyle::Capital => join_mapped(&words, " ", capitalize),
        CaseStyle::Constant => join_mapped(&words, "_", |w| w.to_uppercase()),
        CaseStyle::Dot => join_mapped(&words, ".", |w| w.to_lowercase()),
        CaseStyle::Kebab => join_mapped(&words, "-", |w| w.to_lowercase()),
        CaseStyle::No => join_mapped(&words, " ", |w| w.to_lowercase()),
        CaseStyle::Pascal => join_mapped(&words, "", capitalize),
        CaseStyle::PascalSnake => join_mapped(&words, "_", capitalize),
        CaseStyle::Path => join_mapped(&words, "/", |w| w.to_lowercase()),
        CaseStyle::Sentence => {
            let mut out = capitalize(&words[0]);
            for word in &words[1..] {
                out.push(' ');
                out.push_str(&word.to_lowercase());
            }
            out
        }
        CaseStyle::Snake => join_mapped(&words, "_", |w| w.to_lowercase()),
        CaseStyle::Train => join_mapped(&words, "-", capitalize),
    }
}

/// Splits input into word tokens.
///
/// Separators (`-`, `_`, `.`, `/`, `\`) become boundaries, as do
/// lowercase-to-uppercase transitions and letter/digit transitions.
fn split_words(name: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;

    for c in name.chars() {
        if matches!(c, '-' | '_' | '.' | '/' | '\\') || c.is_whitespace() {
            flush(&mut words, &mut current);
            prev = None;
            continue;
        }

        if let Some(p) = prev {
            let camel_boundary = p.is_lowercase() && c.is_uppercase();
            let digit_boundary =
                (p.is_alphabetic() && c.is_ascii_digit()) || (p.is_ascii_digit() && c.is_alphabetic());
            if camel_boundary || digit_boundary {
                flush(&mut words, &mut current);
            }
        }

        current.push(c);
        prev = Some(c);
    }
    flush(&mut words, &mut current);

    words
}

fn flush(words: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

fn join_mapped(words: &[String], sep: &str, f: impl Fn(&str) -> String) -> String {
    words.iter().map(|w| f(w)).collect::<Vec<_>>().join(sep)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_mixed_separators_and_camel() {
        assert_eq!(split_words("myFile_name-v2"), vec!["my", "File", "name", "v", "2"]);
    }

    #[test]
    fn all_styles_from_same_input() {
        let input = "beach sunset photo";
        assert_eq!(transform(input, CaseStyle::Camel), "beachSunsetPhoto");
        assert_eq!(transform(input, CaseStyle::Capital), "Beach Sunset Photo");
        assert_eq!(transform(input, CaseStyle::Constant), "BEACH_SUNSET_PHOTO");
        assert_eq!(transform(input, CaseStyle::Dot), "beach.sunset.photo");
        assert_eq!(transform(input, CaseStyle::Kebab), "beach-sunset-photo");
        assert_eq!(transform(input, CaseStyle::No), "beach sunset photo");
        assert_eq!(transform(input, CaseStyle::Pascal), "BeachSunsetPhoto");
        assert_eq!(transform(input, CaseStyle::PascalSnake), "Beach_Sunset_Photo");
        assert_eq!(transform(input, CaseStyle::Path), "beach/sunset/photo");
        assert_eq!(transform(input, CaseStyle::Sentence), "Beach sunset photo");
        assert_eq!(transform(input, CaseStyle::Snake), "beach_sunset_photo");
        assert_eq!(transform(input, CaseStyle::Train), "Beach-Sunset-Photo");
    }

    #[test]
    fn kebab_is_idempotent_on_kebab_input() {
        let once = transform("Beach Sunset", CaseStyle::Kebab);
        assert_eq!(transform(&once, CaseStyle::Kebab), once);
    }

    #[test]
    fn empty_input_returned_unchanged() {
        assert_eq!(transform("", CaseStyle::Kebab), "");
        assert_eq!(transform("---", CaseStyle::Snake), "---");
    }

    #[test]
    fn parses_style_names() {
        assert_eq!("kebabCase".parse::<CaseStyle>().unwrap(), CaseStyle::Kebab);
        assert!("shoutyCase".parse::<CaseStyle>().is_err());
    }
}
