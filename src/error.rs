use std::path::PathBuf;

use thiserror::Error;

/// Error types that can occur across the rename pipeline.
#[derive(Debug, Error)]
pub enum RenameError {
    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    HttpError(String),
    /// Authentication and authorization errors
    #[error("Auth error: {0}")]
    AuthError(String),
    /// Invalid request parameters or format
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Errors returned by the LLM provider
    #[error("Provider error: {0}")]
    ProviderError(String),
    /// Response parsing or format error
    #[error("Response format error: {message}. Raw response: {raw_response}")]
    ResponseFormatError {
        message: String,
        raw_response: String,
    },
    /// JSON serialization/deserialization errors
    #[error("JSON parse error: {0}")]
    JsonError(String),
    /// Filesystem errors during metadata extraction, rename or undo
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// Collision resolution gave up after exhausting the suffix counter
    #[error("could not find unique filename for {path} after {attempts} attempts")]
    CollisionExhausted { path: PathBuf, attempts: u32 },
    /// A rename pre-flight check rejected the operation
    #[error("Invalid rename: {0}")]
    InvalidRename(String),
    /// Generic error
    #[error("Generic error: {0}")]
    Generic(String),
}

/// Converts reqwest HTTP errors into pipeline errors
impl From<reqwest::Error> for RenameError {
    fn from(err: reqwest::Error) -> Self {
        RenameError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for RenameError {
    fn from(err: serde_json::Error) -> Self {
        RenameError::JsonError(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}
