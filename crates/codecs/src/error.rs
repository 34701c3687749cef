//! Error types for packetmodem codecs

use thiserror::Error;

/// Codec error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Invalid packet field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Invalid telemetry: {msg}")]
    InvalidTelemetry { msg: String },

    #[error("Value {value} does not fit in {width} base-91 digits")]
    Base91Overflow { value: u32, width: usize },

    #[error("Frame error: {0}")]
    Frame(#[from] packetmodem_frame::FrameError),
}

impl CodecError {
    pub(crate) fn field(field: &'static str, reason: impl Into<String>) -> Self {
        CodecError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for packetmodem codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
