//! Centralized error types for mboxpdf.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// All errors produced by the mboxpdf library.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("MBOX file not found: {0}")]
    FileNotFound(PathBuf),

    /// A required environment variable is not set.
    #[error("Environment variable '{var}' is not set; it is needed to locate {purpose}. Pass --input explicitly instead")]
    MissingEnv { var: String, purpose: String },

    /// The message parser returned an address list entry with no display text.
    #[error("Address list in '{field}' has an entry without display text (subject: {subject:?})")]
    InvalidAddressList { field: &'static str, subject: String },

    /// No usable renderer binary could be found or started.
    #[error("Renderer unavailable: {0}")]
    RendererUnavailable(String),

    /// A render attempt failed.
    #[error("Render failed: {0}")]
    Render(String),

    /// A render attempt exceeded its time limit.
    #[error("Render timed out after {0:?}")]
    RenderTimeout(Duration),

    /// The post-processor could not load or rewrite a document.
    #[error("PDF optimization failed: {0}")]
    Optimize(String),

    /// A background task panicked or was cancelled.
    #[error("Task failed: {0}")]
    Task(String),
}

/// Convenience alias for `Result<T, ConvertError>`.
pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must stop the whole run instead of one message.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingEnv { .. } | Self::InvalidAddressList { .. } | Self::RendererUnavailable(_)
        )
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `ConvertError::io`).
impl From<std::io::Error> for ConvertError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for ConvertError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
