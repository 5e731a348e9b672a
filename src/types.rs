//! Processing and history data model shared across the pipeline.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Current state of the processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    #[default]
    Idle,
    Analyzing,
    Processing,
    Paused,
    Complete,
    /// Never emitted by batch processing, which converts per-file
    /// failures into failed results; reserved for frontends surfacing
    /// fatal setup errors (provider construction, health checks).
    Error,
    Cancelled,
}

/// Lifecycle status of one per-file result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Applied,
    Failed,
}

/// Outcome of processing a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileProcessingResult {
    pub original_path: PathBuf,
    pub original_name: String,
    pub suggested_name: String,
    /// Name after case transformation and sanitization
    pub final_name: Option<String>,
    /// Path after collision resolution
    pub new_path: Option<PathBuf>,
    pub reasoning: String,
    pub tags: Vec<String>,
    pub apply_tags: bool,
    pub system_prompt: Option<String>,
    pub user_prompt: Option<String>,
    pub confidence: f64,
    pub status: ResultStatus,
    pub error_message: Option<String>,
    pub applied_at: Option<DateTime<Local>>,
}

impl FileProcessingResult {
    /// A `failed` placeholder carrying the unit's error text.
    pub fn failed(original_path: PathBuf, error: String) -> Self {
        let original_name = original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            original_path,
            suggested_name: original_name.clone(),
            original_name,
            final_name: None,
            new_path: None,
            reasoning: String::new(),
            tags: Vec::new(),
            apply_tags: false,
            system_prompt: None,
            user_prompt: None,
            confidence: 0.0,
            status: ResultStatus::Failed,
            error_message: Some(error),
            applied_at: None,
        }
    }
}

/// Transient progress snapshot emitted to the status callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub state: ProcessingState,
    pub current_file: Option<String>,
    pub current_index: usize,
    pub total_files: usize,
    pub message: String,
    pub results: Vec<FileProcessingResult>,
}

impl ProcessingStatus {
    /// Completion percentage, zero when the batch is empty.
    pub fn progress_percent(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        let percent = self.current_index as f64 / self.total_files as f64 * 100.0;
        (percent * 10.0).round() / 10.0
    }
}

/// One completed filesystem rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameOperation {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub original_name: String,
    pub new_name: String,
    pub tags_applied: Vec<String>,
    pub timestamp: DateTime<Local>,
}

/// An undoable batch of rename operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryBatch {
    pub batch_id: String,
    pub operations: Vec<RenameOperation>,
    pub created_at: DateTime<Local>,
    pub undone: bool,
    pub undone_at: Option<DateTime<Local>>,
}

impl HistoryBatch {
    pub fn new(operations: Vec<RenameOperation>) -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            operations,
            created_at: Local::now(),
            undone: false,
            undone_at: None,
        }
    }

    pub fn file_count(&self) -> usize {
        self.operations.len()
    }
}
