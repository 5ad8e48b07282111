use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to split {file}: {message}")]
    Split { file: String, message: String },

    /// A credential or endpoint required by a collaborator is missing.
    #[error("Missing configuration: {message}. {hint}")]
    Config { message: String, hint: String },

    /// Embedding or chat-completion call failed. `message` is the provider's raw error text.
    #[error("{operation} failed: {message}")]
    Provider { operation: String, message: String },

    #[error("Vector store {operation} failed: {message}")]
    Store { operation: String, message: String },

    #[error("Vector dimension mismatch: collection has {expected}, embedder produced {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl Error {
    pub fn provider(operation: &str, err: impl std::fmt::Display) -> Self {
        Self::Provider { operation: operation.to_string(), message: err.to_string() }
    }

    pub fn store(operation: &str, err: impl std::fmt::Display) -> Self {
        Self::Store { operation: operation.to_string(), message: err.to_string() }
    }

    /// True for failures scoped to one file or document; the build skips them and continues.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Split { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
