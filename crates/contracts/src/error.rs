//! Layered error definitions
//!
//! Categorized by origin: config / source / transform / sink.
//! `Empty` and `Closed` on channels are not errors and live in `ingestion`.

use thiserror::Error;

use crate::SourceId;

/// Unified error type for configuration and shared data structures
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Data Errors =====
    /// Frame buffer does not match its declared dimensions
    #[error("invalid frame {width}x{height}: expected {expected} bytes, got {actual}")]
    InvalidFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Data source errors
///
/// `EndOfStream` is reported through the error channel but its severity is
/// decided by the source's [`Exhaustion`](crate::Exhaustion) class, not here.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Source cannot be acquired (device missing, file not found)
    #[error("source '{source_id}' open failed: {message}")]
    Open { source_id: SourceId, message: String },

    /// No more data
    #[error("source '{source_id}' reached end of stream")]
    EndOfStream { source_id: SourceId },

    /// A single read failed mid-stream
    #[error("source '{source_id}' read failed: {message}")]
    Read { source_id: SourceId, message: String },
}

impl SourceError {
    pub fn open(source_id: &SourceId, message: impl Into<String>) -> Self {
        Self::Open {
            source_id: source_id.clone(),
            message: message.into(),
        }
    }

    pub fn end_of_stream(source_id: &SourceId) -> Self {
        Self::EndOfStream {
            source_id: source_id.clone(),
        }
    }

    pub fn read(source_id: &SourceId, message: impl Into<String>) -> Self {
        Self::Read {
            source_id: source_id.clone(),
            message: message.into(),
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream { .. })
    }

    pub fn source_id(&self) -> &SourceId {
        match self {
            Self::Open { source_id, .. }
            | Self::EndOfStream { source_id }
            | Self::Read { source_id, .. } => source_id,
        }
    }
}

/// Per-item transform failure. Recoverable: the pool logs it and moves on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("transform failed: {message}")]
pub struct TransformError {
    pub message: String,
}

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Final sink write failure. Always fatal for the run.
#[derive(Debug, Error)]
#[error("sink '{sink_name}' write error: {message}")]
pub struct WriteError {
    pub sink_name: String,
    pub message: String,
}

impl WriteError {
    pub fn new(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
