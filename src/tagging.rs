//! Finder tag application via the macOS `tag` command-line tool.
//!
//! Tagging is best-effort: a missing tool degrades to a no-op with a
//! single warning, and per-file failures never abort a rename.

use std::path::Path;

use tokio::process::Command;
use tokio::sync::OnceCell;

use crate::config::TagMode;

/// Applies and reads Finder tags through the `tag` CLI.
#[derive(Debug, Default)]
pub struct TagManager {
    available: OnceCell<bool>,
}

impl TagManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `tag` tool is on PATH. Probed once and cached.
    pub async fn is_available(&self) -> bool {
        *self
            .available
            .get_or_init(|| async {
                let mut command = Command::new("tag");
                command.arg("--version");
                let found = matches!(command.output().await, Ok(output) if output.status.success());
                if !found {
                    log::warn!(
                        "The `tag` tool was not found; Finder tags will not be applied \
                         (install with: brew install tag)"
                    );
                }
                found
            })
            .await
    }

    /// Applies `tags` to `path` honoring the tag mode.
    ///
    /// Returns the tags actually applied; empty when tagging is
    /// unavailable, the tag list is empty, or the tool fails.
    pub async fn apply_tags(&self, path: &Path, tags: &[String], mode: TagMode) -> Vec<String> {
        let tags: Vec<&str> = tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if tags.is_empty() || !self.is_available().await {
            return Vec::new();
        }

        let joined = tags.join(",");
        let flag = match mode {
            TagMode::Append => "--add",
            TagMode::Replace => "--set",
        };
        let mut command = Command::new("tag");
        command.arg(flag).arg(&joined).arg(path);

        match command.output().await {
            Ok(output) if output.status.success() => {
                log::debug!("Tagged {} with [{joined}]", path.display());
                tags.into_iter().map(str::to_string).collect()
            }
            Ok(output) => {
                log::warn!(
                    "tag failed for {}: {}",
                    path.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                Vec::new()
            }
            Err(err) => {
                log::warn!("tag failed for {}: {err}", path.display());
                Vec::new()
            }
        }
    }

    /// Reads the current Finder tags on `path`.
    pub async fn get_tags(&self, path: &Path) -> Vec<String> {
        if !self.is_available().await {
            return Vec::new();
        }
        let mut command = Command::new("tag");
        command.args(["--list", "--no-name"]).arg(path);

        match command.output().await {
            Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Removes all Finder tags from `path`.
    pub async fn clear_tags(&self, path: &Path) -> bool {
        if !self.is_available().await {
            return false;
        }
        let mut command = Command::new("tag");
        command.args(["--set", ""]).arg(path);
        matches!(command.output().await, Ok(output) if output.status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_tag_list_is_a_noop() {
        let manager = TagManager::new();
        let applied = manager
            .apply_tags(Path::new("/tmp/nothing.txt"), &[], TagMode::Append)
            .await;
        assert!(applied.is_empty());
    }

    #[tokio::test]
    async fn blank_tags_are_filtered_before_probing() {
        let manager = TagManager::new();
        let applied = manager
            .apply_tags(
                Path::new("/tmp/nothing.txt"),
                &["   ".to_string(), String::new()],
                TagMode::Replace,
            )
            .await;
        assert!(applied.is_empty());
    }

    #[tokio::test]
    async fn availability_probe_is_cached() {
        let manager = TagManager::new();
        let first = manager.is_available().await;
        let second = manager.is_available().await;
        assert_eq!(first, second);
    }
}
