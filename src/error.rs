//! Error types for the pipeline engine.

use std::sync::Arc;

/// The terminal error of a pipeline execution.
///
/// Errors are cloned to every observer of a [`Context`](crate::context::Context),
/// so wrapped causes are held behind an `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Graceful completion. Closing a context with this value records no error.
    #[error("stream is done")]
    Done,

    /// The parent context or an external token was cancelled
    #[error("context cancelled")]
    Cancelled,

    /// The context deadline passed before the pipeline finished
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A stage worker panicked with a non-error payload
    #[error("stage panicked: {0}")]
    Panic(String),

    /// A stage failed with a user error
    #[error("stage failed: {0}")]
    Stage(Arc<dyn std::error::Error + Send + Sync>),

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),

    /// `exec` was called before the named part of the pipeline was set
    #[error("pipeline has no {0}")]
    Incomplete(&'static str),
}

// Convenience constructors
impl Error {
    /// Create a stage error from any error type
    pub fn stage<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Stage(Arc::new(error))
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// Whether this is the graceful-completion sentinel
    pub fn is_done(&self) -> bool {
        matches!(self, Error::Done)
    }

    /// Whether this error came from cancellation or a deadline rather than a stage
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::DeadlineExceeded
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Error::Stage(Arc::from(e))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Helper trait for converting foreign errors into our Error type
pub trait IntoError<T> {
    fn into_stage_error(self) -> Result<T>;
}

impl<T, E> IntoError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_stage_error(self) -> Result<T> {
        self.map_err(Error::stage)
    }
}
