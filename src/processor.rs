//! Batch orchestrator: drives files through metadata extraction, prompt
//! construction, LLM invocation, name transformation and collision-safe
//! path resolution, then applies approved renames with an undo record.
//!
//! Concurrency is a rate limit on simultaneous in-flight units, gated by a
//! semaphore. Cancellation is cooperative (checked before and after slot
//! acquisition), pausing blocks units before they start any work, and the
//! returned result list always matches submission order.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::Local;
use futures::future::join_all;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::backends::gather_images;
use crate::case;
use crate::config::AppConfig;
use crate::error::RenameError;
use crate::history::HistoryManager;
use crate::llm::{LLMClient, SuggestionProvider, SuggestionRequest};
use crate::metadata::{ExtractOptions, MetadataExtractor};
use crate::prompts::PromptBuilder;
use crate::safety::{
    resolve_collision, resolve_collision_where, sanitize_filename_default,
    validate_rename_operation,
};
use crate::tagging::TagManager;
use crate::types::{
    FileProcessingResult, HistoryBatch, ProcessingState, ProcessingStatus, RenameOperation,
    ResultStatus,
};

/// Receives a progress snapshot on every state change.
pub type StatusCallback = Arc<dyn Fn(ProcessingStatus) + Send + Sync>;

/// Receives `(completed, total)` while applying approved renames.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

struct BatchState {
    results: BTreeMap<usize, FileProcessingResult>,
    completed: usize,
    total: usize,
}

/// Orchestrates one batch of files at a time.
pub struct FileProcessor {
    config: AppConfig,
    provider: Arc<dyn SuggestionProvider>,
    extractor: MetadataExtractor,
    tagger: TagManager,
    history: HistoryManager,
    cancel: StdMutex<CancellationToken>,
    pause: watch::Sender<bool>,
    /// Paths renamed this session, excluded from neighbor context
    renamed: StdMutex<HashSet<PathBuf>>,
    on_status: Option<StatusCallback>,
}

impl FileProcessor {
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn SuggestionProvider>,
        history: HistoryManager,
    ) -> Self {
        let (pause, _) = watch::channel(false);
        Self {
            config,
            provider,
            extractor: MetadataExtractor::new(),
            tagger: TagManager::new(),
            history,
            cancel: StdMutex::new(CancellationToken::new()),
            pause,
            renamed: StdMutex::new(HashSet::new()),
            on_status: None,
        }
    }

    /// Builds a processor with the provider selected by the config,
    /// resolving the API key from stored references or the environment.
    pub fn from_config(config: AppConfig, history: HistoryManager) -> Result<Self, RenameError> {
        let config = config.with_resolved_api_key();
        let provider = Arc::new(LLMClient::from_config(&config.llm)?);
        Ok(Self::new(config, provider, history))
    }

    pub fn with_status_callback(mut self, callback: StatusCallback) -> Self {
        self.on_status = Some(callback);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Verifies the configured provider is reachable.
    pub async fn health_check(&self) -> Result<(), RenameError> {
        self.provider.health_check().await
    }

    /// Requests cooperative cancellation of the in-flight batch.
    ///
    /// Units not yet started are skipped; in-flight units run to
    /// completion.
    pub fn cancel(&self) {
        self.current_cancel().cancel();
        log::info!("Cancellation requested");
    }

    /// Blocks not-yet-started units until [`resume`](Self::resume).
    pub fn pause(&self) {
        let _ = self.pause.send(true);
        log::info!("Processing paused");
    }

    /// Releases all units waiting on the pause gate.
    pub fn resume(&self) {
        let _ = self.pause.send(false);
        log::info!("Processing resumed");
    }

    /// Processes a batch of files and returns per-file results in
    /// submission order.
    ///
    /// Per-unit failures become `failed` results; the batch itself never
    /// errors. Starting a batch resets the cancel and pause signals and
    /// the session's renamed-path exclusion set.
    pub async fn process_files(&self, paths: Vec<PathBuf>) -> Vec<FileProcessingResult> {
        let cancel = CancellationToken::new();
        *self.lock_cancel() = cancel.clone();
        let _ = self.pause.send(false);
        self.lock_renamed().clear();

        let total = paths.len();
        let state = Mutex::new(BatchState {
            results: BTreeMap::new(),
            completed: 0,
            total,
        });

        {
            let batch = state.lock().await;
            self.emit(
                ProcessingState::Analyzing,
                None,
                format!("Analyzing {total} files"),
                &batch,
            );
        }

        let semaphore = Semaphore::new(self.config.processing.effective_concurrency());
        let units = paths
            .iter()
            .enumerate()
            .map(|(index, path)| self.run_unit(index, path.clone(), &semaphore, &cancel, &state));
        join_all(units).await;

        let mut batch = state.lock().await;
        resolve_batch_collisions(&mut batch.results);

        let (final_state, message) = if cancel.is_cancelled() {
            (ProcessingState::Cancelled, "Processing cancelled".to_string())
        } else {
            (
                ProcessingState::Complete,
                format!("Processed {} files", batch.completed),
            )
        };
        self.emit(final_state, None, message, &batch);
        batch.results.values().cloned().collect()
    }

    async fn run_unit(
        &self,
        index: usize,
        path: PathBuf,
        semaphore: &Semaphore,
        cancel: &CancellationToken,
        state: &Mutex<BatchState>,
    ) {
        if cancel.is_cancelled() {
            return;
        }
        let Ok(_permit) = semaphore.acquire().await else {
            return;
        };
        if cancel.is_cancelled() {
            return;
        }
        if *self.pause.subscribe().borrow() {
            {
                let batch = state.lock().await;
                self.emit(
                    ProcessingState::Paused,
                    None,
                    "Processing paused".to_string(),
                    &batch,
                );
            }
            self.wait_until_resumed().await;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        {
            let batch = state.lock().await;
            self.emit(
                ProcessingState::Processing,
                Some(file_name.clone()),
                format!("Processing {file_name}"),
                &batch,
            );
        }

        let result = match self.process_single(&path).await {
            Ok(result) => result,
            Err(err) => {
                log::warn!("Processing failed for {}: {err}", path.display());
                FileProcessingResult::failed(path, err.to_string())
            }
        };

        let mut batch = state.lock().await;
        batch.results.insert(index, result);
        batch.completed += 1;
        self.emit(
            ProcessingState::Processing,
            Some(file_name.clone()),
            format!("Finished {file_name}"),
            &batch,
        );
    }

    /// The full suggestion pipeline for one file.
    async fn process_single(&self, path: &Path) -> Result<FileProcessingResult, RenameError> {
        let processing = &self.config.processing;

        let exclude_paths = self.lock_renamed().clone();
        let options = ExtractOptions {
            neighbor_count: if processing.include_neighbor_names {
                processing.neighbor_context_count
            } else {
                0
            },
            exclude_paths,
            include_content: processing.include_file_content,
            content_max_chars: processing.content_max_chars,
        };
        let mut metadata = self.extractor.extract(path, &options).await?;

        metadata.include_current_filename = processing.include_current_filename;
        if processing.include_parent_folder {
            metadata.parent_folder_name = path
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned());
        }
        metadata.folder_context = folder_context(path, processing.folder_context_depth);
        metadata.tag_count = processing.tag_count;
        let tag_prompt = processing.tag_prompt.trim();
        metadata.tag_prompt = (!tag_prompt.is_empty()).then(|| tag_prompt.to_string());
        if metadata.video.is_some() {
            metadata.video_extract_count = processing.video_extract_count;
        }

        let system_prompt = PromptBuilder::system_prompt(&metadata, Some(&self.config.prompts));
        let user_prompt = PromptBuilder::user_prompt(&metadata, Some(&self.config.prompts));
        let images = gather_images(&metadata, &self.config.llm).await;
        let request = SuggestionRequest {
            system_prompt: system_prompt.clone(),
            user_prompt: user_prompt.clone(),
            images,
        };
        let response = self.provider.get_suggestion(&request).await?;

        let mut tags = response.tags;
        if let Some(limit) = processing.tag_count {
            tags.truncate(limit as usize);
        }

        let mut name = case::transform(&response.suggested_name, processing.case_style);
        if processing.include_date_prefix {
            let date = metadata
                .image
                .as_ref()
                .and_then(|i| i.date_taken)
                .unwrap_or(metadata.created_at);
            name = format!("{}-{name}", date.format(&processing.date_format));
        }
        let name = sanitize_filename_default(&name);

        let final_name = if processing.preserve_extension && !metadata.extension.is_empty() {
            format!("{name}{}", metadata.extension)
        } else {
            name
        };
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        let new_path = resolve_collision(&parent.join(&final_name))?;
        let final_name = new_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(final_name);

        Ok(FileProcessingResult {
            original_path: path.to_path_buf(),
            original_name: metadata.file_name.clone(),
            suggested_name: response.suggested_name,
            final_name: Some(final_name),
            new_path: Some(new_path),
            reasoning: response.reasoning,
            tags,
            apply_tags: processing.auto_apply_tags,
            system_prompt: Some(system_prompt),
            user_prompt: Some(user_prompt),
            confidence: response.confidence,
            status: ResultStatus::Pending,
            error_message: None,
            applied_at: None,
        })
    }

    /// Renames all approved results in original order, applying tags and
    /// recording a history batch.
    ///
    /// Non-approved results are ignored. A per-file failure marks that
    /// result `failed` and the apply continues; the batch is persisted
    /// even when empty.
    pub async fn apply_results(
        &self,
        results: &mut [FileProcessingResult],
        on_progress: Option<ProgressCallback>,
    ) -> Result<HistoryBatch, RenameError> {
        let total = results
            .iter()
            .filter(|r| r.status == ResultStatus::Approved)
            .count();
        let mut operations = Vec::new();
        let mut completed = 0usize;

        for result in results
            .iter_mut()
            .filter(|r| r.status == ResultStatus::Approved)
        {
            completed += 1;
            if let Some(callback) = &on_progress {
                callback(completed, total);
            }

            let Some(new_path) = result.new_path.clone() else {
                result.status = ResultStatus::Failed;
                result.error_message = Some("No target path resolved".to_string());
                continue;
            };
            if let Err(err) = validate_rename_operation(&result.original_path, &new_path) {
                result.status = ResultStatus::Failed;
                result.error_message = Some(err.to_string());
                continue;
            }
            if let Err(err) = tokio::fs::rename(&result.original_path, &new_path).await {
                log::warn!(
                    "Rename failed for {}: {err}",
                    result.original_path.display()
                );
                result.status = ResultStatus::Failed;
                result.error_message = Some(err.to_string());
                continue;
            }

            let tags_applied = if self.config.processing.auto_apply_tags
                && result.apply_tags
                && !result.tags.is_empty()
            {
                self.tagger
                    .apply_tags(&new_path, &result.tags, self.config.processing.tag_mode)
                    .await
            } else {
                Vec::new()
            };

            operations.push(RenameOperation {
                original_path: result.original_path.clone(),
                new_path: new_path.clone(),
                original_name: result.original_name.clone(),
                new_name: new_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                tags_applied,
                timestamp: Local::now(),
            });
            result.status = ResultStatus::Applied;
            result.applied_at = Some(Local::now());
            self.lock_renamed().insert(new_path);
        }

        let batch = HistoryBatch::new(operations);
        self.history.save_batch(batch.clone()).await?;
        log::info!(
            "Applied {} renames in batch {}",
            batch.file_count(),
            batch.batch_id
        );
        Ok(batch)
    }

    async fn wait_until_resumed(&self) {
        let mut gate = self.pause.subscribe();
        while *gate.borrow() {
            if gate.changed().await.is_err() {
                return;
            }
        }
    }

    fn emit(
        &self,
        state: ProcessingState,
        current_file: Option<String>,
        message: String,
        batch: &BatchState,
    ) {
        let Some(callback) = &self.on_status else {
            return;
        };
        callback(ProcessingStatus {
            state,
            current_file,
            current_index: batch.completed,
            total_files: batch.total,
            message,
            results: batch.results.values().cloned().collect(),
        });
    }

    fn current_cancel(&self) -> CancellationToken {
        self.lock_cancel().clone()
    }

    fn lock_cancel(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_renamed(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.renamed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Joins up to `depth` ancestor directory names, outermost first.
fn folder_context(path: &Path, depth: usize) -> Option<String> {
    if depth == 0 {
        return None;
    }
    let mut names = Vec::new();
    let mut current = path.parent();
    while let Some(dir) = current {
        if names.len() == depth {
            break;
        }
        match dir.file_name() {
            Some(name) => names.push(name.to_string_lossy().into_owned()),
            None => break,
        }
        current = dir.parent();
    }
    if names.is_empty() {
        return None;
    }
    names.reverse();
    Some(names.join("/"))
}

/// Re-resolves pending results whose target is already claimed by an
/// earlier pending result in the same batch. Per-unit resolution only
/// consults the live filesystem, so duplicate suggestions collide here.
fn resolve_batch_collisions(results: &mut BTreeMap<usize, FileProcessingResult>) {
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    for result in results.values_mut() {
        if result.status != ResultStatus::Pending {
            continue;
        }
        let Some(path) = result.new_path.clone() else {
            continue;
        };
        if !claimed.contains(&path) {
            claimed.insert(path);
            continue;
        }

        match resolve_collision_where(&path, |p| p.exists() || claimed.contains(p)) {
            Ok(resolved) => {
                log::debug!(
                    "Batch collision: {} -> {}",
                    path.display(),
                    resolved.display()
                );
                result.final_name = resolved
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
                result.new_path = Some(resolved.clone());
                claimed.insert(resolved);
            }
            Err(err) => {
                result.status = ResultStatus::Failed;
                result.error_message = Some(err.to_string());
            }
        }
    }
}
