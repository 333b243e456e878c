//! Error types for CLI operations.

use pipeline::PipelineError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A source or worker raised the fatal signal
    #[error("Pipeline aborted: {0}")]
    Fatal(#[source] PipelineError),

    /// Batch output had gaps and partial output was not allowed
    #[error("Batch output incomplete: {0}")]
    Incomplete(#[source] PipelineError),

    /// Any other pipeline failure
    #[error("Pipeline execution failed: {0}")]
    Pipeline(#[source] PipelineError),

    /// The pipeline thread panicked or was cancelled
    #[error("Pipeline thread failed: {message}")]
    Join { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn join(message: impl Into<String>) -> Self {
        Self::Join {
            message: message.into(),
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Pipeline(_) | Self::Join { .. } => 1,
            Self::ConfigNotFound { .. } => 2,
            Self::Fatal(_) => 3,
            Self::Incomplete(_) => 4,
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        if err.is_fatal() {
            Self::Fatal(err)
        } else if matches!(err, PipelineError::Incomplete { .. }) {
            Self::Incomplete(err)
        } else {
            Self::Pipeline(err)
        }
    }
}
