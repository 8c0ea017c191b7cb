//! Error types for notebook decoding.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for notebook decoding operations.
pub type NotebookResult<T> = Result<T, NotebookError>;

/// Errors that can occur while decoding a notebook document.
#[derive(Debug, Error)]
pub enum NotebookError {
    /// Failed to read the source file.
    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// The bytes cannot be decoded as the declared format.
    #[error("format error: {0}")]
    Format(String),

    /// The document decoded, but a required substructure is absent.
    #[error("structure error: {0}")]
    Structure(String),
}

impl NotebookError {
    /// Split serde_json failures into the two decode error classes:
    /// syntax-level problems mean the bytes are not the declared format,
    /// data-level problems mean a required field is missing or mistyped.
    pub(crate) fn from_json(err: serde_json::Error) -> Self {
        match err.classify() {
            serde_json::error::Category::Data => NotebookError::Structure(err.to_string()),
            _ => NotebookError::Format(err.to_string()),
        }
    }
}
