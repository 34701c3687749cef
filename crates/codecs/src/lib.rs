//! packetmodem codecs - APRS packet encodings
//!
//! This crate turns typed APRS packets (compressed position reports,
//! messages and acknowledgements, experimental packets and the five
//! telemetry messages) into AX.25 information fields and back, and wraps
//! them in UI frames through [`packetmodem_frame`].

pub mod base91;
pub mod experimental;
pub mod message;
pub mod packet;
pub mod position;
pub mod telemetry;
pub mod transcoder;
pub mod error;

pub use error::{CodecError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        experimental::ExperimentalPacket,
        message::{MessageAck, MessagePacket},
        packet::{identify, AprsPacket, PacketBase, PacketType, SymbolTable},
        position::PositionPacket,
        telemetry::{
            AnalogChannel, AnalogParameter, DigitalChannel, DigitalParameter, TelemetryData,
            TelemetryKind, TelemetryPacket,
        },
        transcoder::TelemetryTranscoder,
        error::{CodecError, Result},
    };
}
