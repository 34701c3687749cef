//! Error types for packetmodem frame

use thiserror::Error;

/// Precondition violations while assembling a frame
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Invalid callsign '{callsign}': expected 3-6 alphanumeric characters")]
    InvalidCallsign { callsign: String },

    #[error("Invalid SSID {ssid}: must be 0-15")]
    InvalidSsid { ssid: u8 },

    #[error("Too many repeater addresses: at most {max} allowed")]
    TooManyRepeaters { max: usize },

    #[error("Information field is empty")]
    EmptyInformation,

    #[error("Information field too long: {length} bytes, at most {max} allowed")]
    InformationTooLong { length: usize, max: usize },

    #[error("Frame has already been built")]
    AlreadyBuilt,

    #[error("Core error: {0}")]
    Core(#[from] packetmodem_core::CoreError),
}

/// Why a received bit stream did not yield a frame
///
/// These are expected outcomes on a noisy channel, not faults.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRejection {
    #[error("no flag found in bit stream")]
    NoFlagSync,

    #[error("found {found} consecutive flags, need at least 2")]
    TooFewFlags { found: usize },

    #[error("bit stream ended before the closing flag")]
    Unterminated,

    #[error("frame too short: {length} bytes")]
    TooShort { length: usize },

    #[error("malformed address field")]
    BadAddress,

    #[error("unexpected control byte {value:#04x}")]
    BadControl { value: u8 },

    #[error("unexpected protocol id {value:#04x}")]
    BadPid { value: u8 },

    #[error("frame check sequence mismatch: received {received:#06x}, computed {computed:#06x}")]
    BadFcs { received: u16, computed: u16 },
}

/// Result type for packetmodem frame operations
pub type Result<T> = std::result::Result<T, FrameError>;
