//! Filesystem safety: filename sanitization, collision resolution and
//! rename pre-flight validation.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::RenameError;

/// Maximum filename length kept below the HFS+ 255-unit limit.
pub const MAX_FILENAME_LENGTH: usize = 200;

/// Collision suffix attempts before giving up.
const MAX_COLLISION_ATTEMPTS: u32 = 9999;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid regex"))
}

fn separator_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-_]{2,}").expect("valid regex"))
}

/// Makes a name safe for use as a filename.
///
/// Applies NFC normalization, replaces unsafe characters with underscores,
/// strips leading/trailing dots and spaces, collapses separator runs and
/// truncates to `max_length` characters. Falls back to `"unnamed"` whenever
/// the result would be empty.
pub fn sanitize_filename(name: &str, max_length: usize) -> String {
    if name.is_empty() {
        return "unnamed".to_string();
    }

    let name: String = name.nfc().collect();
    let name = unsafe_chars().replace_all(&name, "_");
    let name = name.trim_matches(|c| c == '.' || c == ' ');
    let name = separator_runs().replace_all(name, "-");

    let mut name = name.to_string();
    if name.chars().count() > max_length {
        name = name.chars().take(max_length).collect();
        name = name
            .trim_end_matches(|c| matches!(c, '-' | '_' | '.' | ' '))
            .to_string();
    }

    if name.is_empty() {
        return "unnamed".to_string();
    }
    name
}

/// Sanitizes with the default maximum length.
pub fn sanitize_filename_default(name: &str) -> String {
    sanitize_filename(name, MAX_FILENAME_LENGTH)
}

/// Finds a unique path when the target already exists.
///
/// Returns the input unchanged when nothing occupies it; otherwise appends
/// `_v1`, `_v2`, ... before the extension. Errors after 9999 attempts as a
/// sanity ceiling.
pub fn resolve_collision(target_path: &Path) -> Result<PathBuf, RenameError> {
    resolve_collision_where(target_path, |candidate| candidate.exists())
}

/// Like [`resolve_collision`], but with a caller-supplied occupancy check.
///
/// Used to also avoid paths claimed by other pending results in the same
/// batch, which exist nowhere on disk yet.
pub fn resolve_collision_where(
    target_path: &Path,
    occupied: impl Fn(&Path) -> bool,
) -> Result<PathBuf, RenameError> {
    if !occupied(target_path) {
        return Ok(target_path.to_path_buf());
    }

    let parent = target_path.parent().unwrap_or_else(|| Path::new(""));
    let stem = target_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed");
    let suffix = target_path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| format!(".{s}"))
        .unwrap_or_default();

    for counter in 1..=MAX_COLLISION_ATTEMPTS {
        let candidate = parent.join(format!("{stem}_v{counter}{suffix}"));
        if !occupied(&candidate) {
            return Ok(candidate);
        }
    }

    Err(RenameError::CollisionExhausted {
        path: target_path.to_path_buf(),
        attempts: MAX_COLLISION_ATTEMPTS,
    })
}

/// Pre-flight validation of one rename operation.
///
/// Rejects missing or non-regular sources, missing target directories,
/// renames onto the same file and over-long encoded filenames.
pub fn validate_rename_operation(source: &Path, target: &Path) -> Result<(), RenameError> {
    if !source.exists() {
        return Err(RenameError::InvalidRename(format!(
            "Source file does not exist: {}",
            source.display()
        )));
    }
    if !source.is_file() {
        return Err(RenameError::InvalidRename(format!(
            "Source is not a file: {}",
            source.display()
        )));
    }
    let target_parent = target.parent().unwrap_or_else(|| Path::new(""));
    if !target_parent.as_os_str().is_empty() && !target_parent.exists() {
        return Err(RenameError::InvalidRename(format!(
            "Target directory does not exist: {}",
            target_parent.display()
        )));
    }
    if let (Ok(src), Ok(dst)) = (source.canonicalize(), target.canonicalize()) {
        if src == dst {
            return Err(RenameError::InvalidRename(
                "Source and target are the same file".to_string(),
            ));
        }
    }
    if let Some(name) = target.file_name() {
        if name.to_string_lossy().len() > 255 {
            return Err(RenameError::InvalidRename(format!(
                "Filename too long: {}",
                name.to_string_lossy()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn empty_name_becomes_unnamed() {
        assert_eq!(sanitize_filename("", MAX_FILENAME_LENGTH), "unnamed");
        assert_eq!(sanitize_filename("...   ", MAX_FILENAME_LENGTH), "unnamed");
    }

    #[test]
    fn unsafe_chars_replaced() {
        assert_eq!(
            sanitize_filename("a<b>c:d?e", MAX_FILENAME_LENGTH),
            "a_b_c_d_e"
        );
    }

    #[test]
    fn separator_runs_collapse() {
        assert_eq!(sanitize_filename("a__b--c", MAX_FILENAME_LENGTH), "a-b-c");
    }

    #[test]
    fn long_names_truncate() {
        let long = "a".repeat(500);
        let out = sanitize_filename(&long, MAX_FILENAME_LENGTH);
        assert_eq!(out.chars().count(), MAX_FILENAME_LENGTH);
    }

    #[test]
    fn truncation_trims_trailing_separators() {
        let mut long = "a".repeat(199);
        long.push('-');
        long.push_str(&"b".repeat(100));
        let out = sanitize_filename(&long, 200);
        assert!(!out.ends_with('-'));
    }

    #[test]
    fn collision_returns_input_when_free() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        assert_eq!(resolve_collision(&path).unwrap(), path);
    }

    #[test]
    fn collision_appends_version_suffixes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        fs::write(&path, b"x").unwrap();
        assert_eq!(
            resolve_collision(&path).unwrap(),
            dir.path().join("photo_v1.jpg")
        );

        fs::write(dir.path().join("photo_v1.jpg"), b"x").unwrap();
        assert_eq!(
            resolve_collision(&path).unwrap(),
            dir.path().join("photo_v2.jpg")
        );
    }

    #[test]
    fn collision_respects_claimed_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        let claimed =
            std::collections::HashSet::from([path.clone(), dir.path().join("photo_v1.jpg")]);
        let resolved =
            resolve_collision_where(&path, |p| p.exists() || claimed.contains(p)).unwrap();
        assert_eq!(resolved, dir.path().join("photo_v2.jpg"));
    }

    #[test]
    fn validate_rejects_missing_source() {
        let dir = tempdir().unwrap();
        let err = validate_rename_operation(
            &dir.path().join("missing.txt"),
            &dir.path().join("target.txt"),
        )
        .unwrap_err();
        assert!(matches!(err, RenameError::InvalidRename(_)));
    }

    #[test]
    fn validate_rejects_same_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"x").unwrap();
        assert!(validate_rename_operation(&path, &path).is_err());
    }

    #[test]
    fn validate_accepts_plain_rename() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"x").unwrap();
        assert!(validate_rename_operation(&src, &dir.path().join("b.txt")).is_ok());
    }
}
