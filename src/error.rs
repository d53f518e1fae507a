//! Error types for gaia-harness operations.
//!
//! One error enum per subsystem:
//! - Dataset loading and hub downloads
//! - Agent society construction and execution
//! - Result store persistence
//! - LLM API interactions
//! - Harness configuration
//!
//! [`HarnessError`] wraps them for the batch driver and the scorer.

use thiserror::Error;

/// Errors that can occur while loading or fetching benchmark tasks.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Dataset split directory not found: {0}")]
    SplitNotFound(String),

    #[error("No metadata file (metadata.jsonl or metadata.parquet) in {0}")]
    MissingMetadata(String),

    #[error("Malformed metadata at {path}:{line}: {message}")]
    MalformedLine {
        path: String,
        line: usize,
        message: String,
    },

    #[error("Malformed metadata at {path}, row {row}: {message}")]
    MalformedRow {
        path: String,
        row: usize,
        message: String,
    },

    #[error("Invalid level '{0}': expected 1, 2 or 3")]
    InvalidLevel(String),

    #[error("Invalid split '{0}': expected 'validation' or 'test'")]
    InvalidSplit(String),

    #[error("Download of '{url}' failed ({status}): {message}")]
    DownloadFailed {
        url: String,
        status: u16,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while constructing or running an agent society.
#[derive(Debug, Error)]
pub enum SocietyError {
    #[error("Failed to construct society: {0}")]
    Construction(String),

    #[error("Society execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Society timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Agent process exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Society thread panicked: {0}")]
    Panicked(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while persisting or replaying results.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task '{0}' is already recorded in this run")]
    Duplicate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: {0} environment variable not set")]
    MissingApiKey(String),

    #[error("Missing API base URL: {0} environment variable not set")]
    MissingApiBase(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors surfaced by whole-run operations (batch run, scoring).
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Split '{0}' has no public ground truth and cannot be scored")]
    UnscorableSplit(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Society(#[from] SocietyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
