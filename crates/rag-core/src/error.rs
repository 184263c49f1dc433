//! Error types for the RAG pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using RagError.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur anywhere in the pipeline.
///
/// Nothing is recovered automatically: every variant propagates to the
/// top-level caller, which owns user-facing messaging.
#[derive(Error, Debug)]
pub enum RagError {
    /// Input directory missing, or it holds no matching files.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// An operation was invoked out of order.
    #[error("Precondition failed: {message}")]
    PreconditionFailed { message: String },

    /// Invalid configuration, detected before any I/O.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The embedding or chat service failed or is unreachable.
    #[error("Dependency failure ({service}): {message}")]
    Dependency { service: String, message: String },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The persist directory is held by another index handle.
    #[error("Index locked: {} is in use by another reader or writer", path.display())]
    IndexLocked { path: PathBuf },

    /// A matching file could not be read as text.
    #[error("Failed to load {}: {reason}", path.display())]
    LoadFailed { path: PathBuf, reason: String },

    /// Database error.
    #[error("Database error: {message}")]
    Database { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RagError {
    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a dependency error for the named service.
    pub fn dependency(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dependency {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable code for CLI output and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Dependency { .. } => "DEPENDENCY_FAILURE",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::IndexLocked { .. } => "INDEX_LOCKED",
            Self::LoadFailed { .. } => "LOAD_FAILED",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagError::not_found("Directory docs does not exist.");
        assert!(err.to_string().contains("docs does not exist"));

        let err = RagError::dependency("ollama chat", "connection refused");
        assert_eq!(
            err.to_string(),
            "Dependency failure (ollama chat): connection refused"
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(RagError::not_found("x").error_code(), "NOT_FOUND");
        assert_eq!(
            RagError::precondition("x").error_code(),
            "PRECONDITION_FAILED"
        );
        assert_eq!(RagError::config("x").error_code(), "CONFIG_ERROR");
        assert_eq!(
            RagError::IndexLocked {
                path: PathBuf::from("db")
            }
            .error_code(),
            "INDEX_LOCKED"
        );
    }
}
