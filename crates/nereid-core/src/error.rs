//! Error types for nereid-core.

use std::time::Duration;

use thiserror::Error;

/// Result type for nereid-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while orchestrating a run.
///
/// All of these are terminal for the run: the orchestrator converts them
/// into a `Failure` report with a diagnostic message and never retries.
/// A fault reported by the kernel for one unit is not an error variant;
/// it is recorded as a per-unit outcome so it stays distinguishable from
/// transport failure.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The kernel session could not be established within the launch timeout.
    #[error("failed to connect to kernel `{kernel}`: {message}")]
    Connect { kernel: String, message: String },

    /// Malformed input document.
    #[error(transparent)]
    Notebook(#[from] nereid_notebook::NotebookError),

    /// The kernel connection was lost or misbehaved mid-run.
    #[error("transport error: {0}")]
    Transport(String),

    /// The kernel produced no protocol traffic within the deadline.
    #[error("kernel did not respond within {0:?}")]
    ResponseTimeout(Duration),

    /// The run was cancelled from outside.
    #[error("run cancelled")]
    Cancelled,

    /// Failed to encode or decode a protocol message.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
