//! Persistent rename history with batch-level undo.
//!
//! Batches are stored oldest-first in a single JSON file, capped at the
//! most recent [`MAX_HISTORY_BATCHES`]. Undo restores original names in
//! reverse order and records per-file failures without aborting.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::RenameError;
use crate::types::HistoryBatch;

pub const MAX_HISTORY_BATCHES: usize = 100;

/// Aggregate counters over the stored history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryStatistics {
    pub total_batches: usize,
    pub total_renames: usize,
    pub undone_batches: usize,
}

/// Loads, appends and undoes rename batches.
pub struct HistoryManager {
    history_path: PathBuf,
}

impl HistoryManager {
    pub fn new(history_path: impl Into<PathBuf>) -> Self {
        Self {
            history_path: history_path.into(),
        }
    }

    /// Store at the platform data directory (`<data>/namewise/history.json`).
    pub fn default_location() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("data"));
        Self::new(base.join("namewise").join("history.json"))
    }

    pub fn path(&self) -> &Path {
        &self.history_path
    }

    /// Loads all stored batches; a missing or corrupt file yields an
    /// empty history.
    pub async fn load(&self) -> Vec<HistoryBatch> {
        let raw = match tokio::fs::read_to_string(&self.history_path).await {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(batches) => batches,
            Err(err) => {
                log::warn!(
                    "Invalid history at {}: {err}; starting fresh",
                    self.history_path.display()
                );
                Vec::new()
            }
        }
    }

    /// Appends a batch and persists, dropping the oldest batches beyond
    /// the cap.
    pub async fn save_batch(&self, batch: HistoryBatch) -> Result<(), RenameError> {
        let mut batches = self.load().await;
        batches.push(batch);
        if batches.len() > MAX_HISTORY_BATCHES {
            let excess = batches.len() - MAX_HISTORY_BATCHES;
            batches.drain(..excess);
        }
        self.persist(&batches).await
    }

    /// The most recent batch that has not been undone.
    pub async fn get_last_batch(&self) -> Option<HistoryBatch> {
        self.load()
            .await
            .into_iter()
            .rev()
            .find(|batch| !batch.undone)
    }

    /// Undoes the most recent non-undone batch.
    pub async fn undo_last(&self) -> Result<(usize, Vec<String>), RenameError> {
        let batch = self
            .get_last_batch()
            .await
            .ok_or_else(|| RenameError::Generic("No batch to undo".to_string()))?;
        self.undo_batch(&batch.batch_id).await
    }

    /// Undoes the batch with `batch_id`, restoring original names in
    /// reverse order.
    ///
    /// Returns the number of files restored plus per-file error messages.
    /// An unknown or already-undone batch comes back as `(0, [message])`
    /// with the history untouched. The batch is marked undone and
    /// persisted even when some files cannot be restored.
    pub async fn undo_batch(&self, batch_id: &str) -> Result<(usize, Vec<String>), RenameError> {
        let mut batches = self.load().await;
        let Some(batch) = batches
            .iter_mut()
            .find(|batch| batch.batch_id == batch_id)
        else {
            return Ok((0, vec![format!("Batch not found: {batch_id}")]));
        };
        if batch.undone {
            return Ok((0, vec!["Batch has already been undone".to_string()]));
        }

        let mut restored = 0usize;
        let mut errors = Vec::new();
        for operation in batch.operations.iter().rev() {
            if !operation.new_path.exists() {
                errors.push(format!(
                    "File not found: {}",
                    operation.new_path.display()
                ));
                continue;
            }
            if operation.original_path.exists() {
                errors.push(format!(
                    "Original path already exists: {}",
                    operation.original_path.display()
                ));
                continue;
            }
            match tokio::fs::rename(&operation.new_path, &operation.original_path).await {
                Ok(()) => {
                    restored += 1;
                    log::debug!(
                        "Restored {} -> {}",
                        operation.new_name,
                        operation.original_name
                    );
                }
                Err(err) => errors.push(format!(
                    "Cannot restore {}: {err}",
                    operation.new_path.display()
                )),
            }
        }

        batch.undone = true;
        batch.undone_at = Some(Local::now());
        self.persist(&batches).await?;

        log::info!(
            "Undid batch {batch_id}: {restored} restored, {} failed",
            errors.len()
        );
        Ok((restored, errors))
    }

    /// Counters across all stored batches.
    pub async fn statistics(&self) -> HistoryStatistics {
        let batches = self.load().await;
        HistoryStatistics {
            total_batches: batches.len(),
            total_renames: batches.iter().map(HistoryBatch::file_count).sum(),
            undone_batches: batches.iter().filter(|b| b.undone).count(),
        }
    }

    async fn persist(&self, batches: &[HistoryBatch]) -> Result<(), RenameError> {
        if let Some(parent) = self.history_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(batches)?;
        tokio::fs::write(&self.history_path, raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RenameOperation;
    use std::fs;
    use tempfile::tempdir;

    fn operation(dir: &Path, from: &str, to: &str) -> RenameOperation {
        RenameOperation {
            original_path: dir.join(from),
            new_path: dir.join(to),
            original_name: from.to_string(),
            new_name: to.to_string(),
            tags_applied: Vec::new(),
            timestamp: Local::now(),
        }
    }

    #[tokio::test]
    async fn corrupt_history_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, b"[{broken").unwrap();
        assert!(HistoryManager::new(path).load().await.is_empty());
    }

    #[tokio::test]
    async fn save_caps_batch_count_dropping_oldest_first() {
        let dir = tempdir().unwrap();
        let manager = HistoryManager::new(dir.path().join("history.json"));
        let mut ids = Vec::new();
        for _ in 0..MAX_HISTORY_BATCHES + 5 {
            let batch = HistoryBatch::new(Vec::new());
            ids.push(batch.batch_id.clone());
            manager.save_batch(batch).await.unwrap();
        }

        let stored = manager.load().await;
        assert_eq!(stored.len(), MAX_HISTORY_BATCHES);
        // The five oldest fell off; everything newer survives in order.
        assert!(!stored.iter().any(|b| b.batch_id == ids[0]));
        assert_eq!(stored[0].batch_id, ids[5]);
        assert_eq!(
            stored.last().map(|b| b.batch_id.clone()),
            ids.last().cloned()
        );
    }

    #[tokio::test]
    async fn undo_restores_files_and_marks_batch() {
        let dir = tempdir().unwrap();
        let manager = HistoryManager::new(dir.path().join("history.json"));
        fs::write(dir.path().join("b.txt"), b"x").unwrap();

        let batch = HistoryBatch::new(vec![operation(dir.path(), "a.txt", "b.txt")]);
        let batch_id = batch.batch_id.clone();
        manager.save_batch(batch).await.unwrap();

        let (restored, errors) = manager.undo_batch(&batch_id).await.unwrap();
        assert_eq!(restored, 1);
        assert!(errors.is_empty());
        assert!(dir.path().join("a.txt").exists());
        assert!(!dir.path().join("b.txt").exists());
        assert!(manager.load().await[0].undone);
    }

    #[tokio::test]
    async fn undo_reports_missing_files_but_persists() {
        let dir = tempdir().unwrap();
        let manager = HistoryManager::new(dir.path().join("history.json"));

        let batch = HistoryBatch::new(vec![operation(dir.path(), "a.txt", "gone.txt")]);
        let batch_id = batch.batch_id.clone();
        manager.save_batch(batch).await.unwrap();

        let (restored, errors) = manager.undo_batch(&batch_id).await.unwrap();
        assert_eq!(restored, 0);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("File not found"));
        assert!(manager.load().await[0].undone);
    }

    #[tokio::test]
    async fn double_undo_is_rejected() {
        let dir = tempdir().unwrap();
        let manager = HistoryManager::new(dir.path().join("history.json"));
        let batch = HistoryBatch::new(Vec::new());
        let batch_id = batch.batch_id.clone();
        manager.save_batch(batch).await.unwrap();

        manager.undo_batch(&batch_id).await.unwrap();
        let (restored, errors) = manager.undo_batch(&batch_id).await.unwrap();
        assert_eq!(restored, 0);
        assert_eq!(errors, vec!["Batch has already been undone".to_string()]);
    }

    #[tokio::test]
    async fn unknown_batch_is_rejected() {
        let dir = tempdir().unwrap();
        let manager = HistoryManager::new(dir.path().join("history.json"));
        let (restored, errors) = manager.undo_batch("nope").await.unwrap();
        assert_eq!(restored, 0);
        assert_eq!(errors, vec!["Batch not found: nope".to_string()]);
        assert!(manager.load().await.is_empty());
    }

    #[tokio::test]
    async fn last_batch_skips_undone() {
        let dir = tempdir().unwrap();
        let manager = HistoryManager::new(dir.path().join("history.json"));

        let first = HistoryBatch::new(Vec::new());
        let first_id = first.batch_id.clone();
        manager.save_batch(first).await.unwrap();
        let second = HistoryBatch::new(Vec::new());
        let second_id = second.batch_id.clone();
        manager.save_batch(second).await.unwrap();

        manager.undo_batch(&second_id).await.unwrap();
        let last = manager.get_last_batch().await.unwrap();
        assert_eq!(last.batch_id, first_id);
    }

    #[tokio::test]
    async fn statistics_count_batches_and_renames() {
        let dir = tempdir().unwrap();
        let manager = HistoryManager::new(dir.path().join("history.json"));
        fs::write(dir.path().join("x.txt"), b"x").unwrap();
        manager
            .save_batch(HistoryBatch::new(vec![operation(
                dir.path(),
                "w.txt",
                "x.txt",
            )]))
            .await
            .unwrap();
        manager.save_batch(HistoryBatch::new(Vec::new())).await.unwrap();

        let stats = manager.statistics().await;
        assert_eq!(stats.total_batches, 2);
        assert_eq!(stats.total_renames, 1);
        assert_eq!(stats.undone_batches, 0);
    }
}
