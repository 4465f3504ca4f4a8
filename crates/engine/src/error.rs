//! Error types for `apiscope-engine`.

use thiserror::Error;

/// Why a `$ref` could not be walked to a schema.
///
/// Never fatal to example generation: synthesis substitutes a placeholder and continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// External file / URL refs (there is no cross-document loader).
    #[error("Unsupported $ref '{0}' (only internal '#/...' references are resolved)")]
    External(String),

    #[error("Unresolved $ref '{reference}' (missing segment '{segment}')")]
    Missing { reference: String, segment: String },

    #[error("Cyclic $ref detected while resolving: {0}")]
    Cyclic(String),
}

/// Main error type for the example engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration errors (invalid capacity / TTL).
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    #[error("Operation not found: {method} {path}")]
    OperationNotFound { path: String, method: String },

    #[error("Schema not found: {name}")]
    SchemaNotFound { name: String },

    /// A `$ref` that the caller asked for directly (e.g. a named schema lookup) failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Example engine has been shut down")]
    EngineShutDown,
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
