//! packetmodem station - receive and transmit pipelines
//!
//! This crate ties the modem, framing and APRS layers together into
//! station-level receivers and transmitters, and carries the station's TOML
//! configuration and logging setup.

pub mod config;
pub mod logging;
pub mod receiver;
pub mod transmitter;
pub mod error;

pub use error::{Result, StationError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        config::StationConfig,
        logging::init_logging,
        receiver::{AfskReceiver, AprsReceiver, QueueKind, ReceivedPacket, ReceiverSettings, ReceiverStats, SignalGate},
        transmitter::{AprsTransmitter, PskTransmitter},
        error::{Result, StationError},
    };
}
