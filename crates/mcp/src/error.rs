//! Error types for the MCP server.

use apiscope_engine::EngineError;
use thiserror::Error;

/// Main error type for the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration errors (invalid YAML, missing spec directory, bad engine settings)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("failed to read spec file '{path}': {source}")]
    SpecRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse OpenAPI spec '{path}': {message}")]
    SpecParse { path: String, message: String },

    #[error("Unknown API '{0}'")]
    UnknownApi(String),

    /// Tool arguments failed validation.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
