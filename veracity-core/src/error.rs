//! Error types for the Veracity fact-checking core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the LLM, retrieval, configuration and dataset domains.

use std::path::PathBuf;

/// Top-level error type for the Veracity core library.
#[derive(Debug, thiserror::Error)]
pub enum VeracityError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Model returned an empty response")]
    EmptyResponse,
}

/// Errors from the web search collaborator.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Search request failed: {message}")]
    Request { message: String },

    #[error("Search API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Search response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Search API key not set (env var '{var}')")]
    MissingApiKey { var: String },

    #[error("Refusing to search with an empty query")]
    EmptyQuery,
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors raised while reading claim datasets and output sinks.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Column '{column}' not found in {path} (columns: {available})")]
    MissingColumn {
        column: String,
        path: PathBuf,
        available: String,
    },

    #[error("Cannot read header of {path}: {message}")]
    UnreadableHeader { path: PathBuf, message: String },

    #[error("Unknown dataset profile '{name}'")]
    UnknownProfile { name: String },
}

/// A batch run stopped on a fatal error.
///
/// Every row counted in `completed` was written and synced before `source`
/// was raised, so a later run resumes right after it.
#[derive(Debug, thiserror::Error)]
#[error("Batch aborted after {completed} new row(s): {source}")]
pub struct BatchAborted {
    pub completed: usize,
    #[source]
    pub source: VeracityError,
}

/// A type alias for results using the top-level `VeracityError`.
pub type Result<T> = std::result::Result<T, VeracityError>;
