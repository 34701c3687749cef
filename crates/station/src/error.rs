//! Error types for packetmodem station

use crate::receiver::QueueKind;
use thiserror::Error;

/// Station error types
#[derive(Error, Debug)]
pub enum StationError {
    #[error("Receive queue for {kind} packets is full")]
    BufferFull { kind: QueueKind },

    #[error("Configuration error: {msg}")]
    Config { msg: String },

    #[error("Modem error: {0}")]
    Modem(#[from] packetmodem_modem::ModemError),

    #[error("Frame error: {0}")]
    Frame(#[from] packetmodem_frame::FrameError),

    #[error("Codec error: {0}")]
    Codec(#[from] packetmodem_codecs::CodecError),
}

/// Result type for packetmodem station operations
pub type Result<T> = std::result::Result<T, StationError>;
