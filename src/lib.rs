//! LLM-assisted file renaming.
//!
//! namewise walks a batch of files through metadata extraction, prompt
//! construction, an LLM suggestion call, case transformation and
//! collision-safe path resolution, then applies approved renames with
//! Finder tagging and an undoable history record.
//!
//! ```no_run
//! use std::sync::Arc;
//! use namewise::config::AppConfig;
//! use namewise::history::HistoryManager;
//! use namewise::processor::FileProcessor;
//! use namewise::types::ResultStatus;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), namewise::error::RenameError> {
//!     let processor =
//!         FileProcessor::from_config(AppConfig::default(), HistoryManager::default_location())?;
//!     let mut results = processor
//!         .process_files(vec!["/tmp/IMG_4021.jpg".into()])
//!         .await;
//!     for result in &mut results {
//!         result.status = ResultStatus::Approved;
//!     }
//!     processor.apply_results(&mut results, None).await?;
//!     Ok(())
//! }
//! ```

pub mod backends;
pub mod case;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod media;
pub mod metadata;
pub mod processor;
pub mod prompts;
pub mod safety;
pub mod tagging;
pub mod types;

pub use backends::ProviderKind;
pub use case::CaseStyle;
pub use config::{AppConfig, ConfigStore};
pub use error::RenameError;
pub use history::HistoryManager;
pub use llm::{LLMClient, LLMRenameResponse, SuggestionProvider};
pub use metadata::{FileMetadata, MetadataExtractor};
pub use processor::FileProcessor;
pub use types::{FileProcessingResult, HistoryBatch, ProcessingStatus, ResultStatus};

/// Initializes env-filtered logging when the `logging` feature is enabled.
#[cfg(feature = "logging")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
