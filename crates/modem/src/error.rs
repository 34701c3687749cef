//! Error types for packetmodem modem

use thiserror::Error;

/// Modem error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModemError {
    #[error("Invalid modulation parameters: {msg}")]
    InvalidParameters { msg: String },

    #[error("Character {character:?} has no varicode representation")]
    UnsupportedCharacter { character: char },

    #[error("Core error: {0}")]
    Core(#[from] packetmodem_core::CoreError),
}

/// Result type for packetmodem modem operations
pub type Result<T> = std::result::Result<T, ModemError>;
