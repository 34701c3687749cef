//! APRS packet base fields, type identification and frame glue

use crate::experimental::ExperimentalPacket;
use crate::message::{MessageAck, MessagePacket};
use crate::position::PositionPacket;
use crate::telemetry::{TelemetryKind, TelemetryPacket};
use crate::{CodecError, Result};
use packetmodem_core::bitstream::BitBuffer;
use packetmodem_frame::address::{is_valid_callsign, Address, MAX_SSID};
use packetmodem_frame::frame::{Frame, FrameBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Destination callsign used when none is configured
pub const DEFAULT_DESTINATION: &str = "APZMWV";

/// APRS symbol table selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolTable {
    #[default]
    Primary,
    Secondary,
}

impl SymbolTable {
    pub fn identifier(self) -> u8 {
        match self {
            SymbolTable::Primary => b'/',
            SymbolTable::Secondary => b'\\',
        }
    }

    pub fn from_identifier(identifier: u8) -> Option<Self> {
        match identifier {
            b'/' => Some(SymbolTable::Primary),
            b'\\' => Some(SymbolTable::Secondary),
            _ => None,
        }
    }
}

/// Fields shared by every APRS packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketBase {
    pub source: String,
    pub source_ssid: u8,
    pub destination: String,
    pub destination_ssid: u8,
    pub symbol_table: SymbolTable,
    pub symbol: char,
}

impl Default for PacketBase {
    fn default() -> Self {
        Self {
            source: String::new(),
            source_ssid: 0,
            destination: DEFAULT_DESTINATION.to_string(),
            destination_ssid: 0,
            symbol_table: SymbolTable::Primary,
            symbol: '/',
        }
    }
}

impl PacketBase {
    pub fn new(source: &str, source_ssid: u8) -> Self {
        Self {
            source: source.to_string(),
            source_ssid,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_callsign(&self.source) {
            return Err(CodecError::field("source", "expected 3-6 alphanumeric characters"));
        }
        if self.source_ssid > MAX_SSID {
            return Err(CodecError::field("source_ssid", format!("{} exceeds 15", self.source_ssid)));
        }
        if !is_valid_callsign(&self.destination) {
            return Err(CodecError::field(
                "destination",
                "expected 3-6 alphanumeric characters",
            ));
        }
        if self.destination_ssid > MAX_SSID {
            return Err(CodecError::field(
                "destination_ssid",
                format!("{} exceeds 15", self.destination_ssid),
            ));
        }
        if !('!'..='~').contains(&self.symbol) {
            return Err(CodecError::field("symbol", format!("{:?} is not printable", self.symbol)));
        }
        Ok(())
    }

    /// Source and destination of a received frame
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            source: frame.source().callsign().to_string(),
            source_ssid: frame.source().ssid(),
            destination: frame.destination().callsign().to_string(),
            destination_ssid: frame.destination().ssid(),
            ..Self::default()
        }
    }

    /// UI frame from this base carrying `information`
    pub fn frame(&self, information: &[u8]) -> Result<Frame> {
        self.validate()?;
        let frame = FrameBuilder::new()
            .destination(Address::new(&self.destination, self.destination_ssid)?)
            .source(Address::new(&self.source, self.source_ssid)?)
            .information(information)
            .build()?;
        Ok(frame)
    }

    /// Build the frame and return its serialized bytes, FCS included
    pub fn encode_frame(&self, information: &[u8]) -> Result<Vec<u8>> {
        Ok(self.frame(information)?.build_frame()?)
    }

    /// Build the frame and return the NRZI line bits ready for the modulator
    pub fn encode_bit_stream(&self, information: &[u8]) -> Result<BitBuffer> {
        Ok(self.frame(information)?.encode_bit_stream()?)
    }
}

/// Kind of APRS packet, decided from the information field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    Position,
    Message,
    Experimental,
    TelemetryDataReport,
    TelemetryParameterName,
    TelemetryParameterUnit,
    TelemetryCoefficient,
    TelemetryBitSense,
    Unknown,
}

impl PacketType {
    pub fn telemetry_kind(self) -> Option<TelemetryKind> {
        match self {
            PacketType::TelemetryDataReport => Some(TelemetryKind::DataReport),
            PacketType::TelemetryParameterName => Some(TelemetryKind::ParameterName),
            PacketType::TelemetryParameterUnit => Some(TelemetryKind::ParameterUnit),
            PacketType::TelemetryCoefficient => Some(TelemetryKind::Coefficient),
            PacketType::TelemetryBitSense => Some(TelemetryKind::BitSense),
            _ => None,
        }
    }
}

/// Offset of the `.` that ends a telemetry header inside a message
const TELEMETRY_HEADER_DOT: usize = 15;

/// Identify a packet by its data type identifier
///
/// Telemetry parameter messages ride in the message format
/// (`:N0CALL-1 :PARM.`), so a message whose body starts with one of the
/// telemetry headers is reported as that telemetry kind.
pub fn identify(information: &[u8]) -> PacketType {
    match information.first() {
        Some(b'@') | Some(b'/') => PacketType::Position,
        Some(b':') => {
            if information.len() > TELEMETRY_HEADER_DOT && information[TELEMETRY_HEADER_DOT] == b'.' {
                match &information[11..TELEMETRY_HEADER_DOT] {
                    b"PARM" => PacketType::TelemetryParameterName,
                    b"UNIT" => PacketType::TelemetryParameterUnit,
                    b"EQNS" => PacketType::TelemetryCoefficient,
                    b"BITS" => PacketType::TelemetryBitSense,
                    _ => PacketType::Message,
                }
            } else {
                PacketType::Message
            }
        }
        Some(b'{') => PacketType::Experimental,
        Some(b'T') => PacketType::TelemetryDataReport,
        _ => PacketType::Unknown,
    }
}

/// Any supported APRS packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AprsPacket {
    Position(PositionPacket),
    Message(MessagePacket),
    Ack(MessageAck),
    Experimental(ExperimentalPacket),
    Telemetry(TelemetryPacket),
}

impl AprsPacket {
    pub fn base(&self) -> &PacketBase {
        match self {
            AprsPacket::Position(p) => &p.base,
            AprsPacket::Message(p) => &p.base,
            AprsPacket::Ack(p) => &p.base,
            AprsPacket::Experimental(p) => &p.base,
            AprsPacket::Telemetry(p) => &p.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut PacketBase {
        match self {
            AprsPacket::Position(p) => &mut p.base,
            AprsPacket::Message(p) => &mut p.base,
            AprsPacket::Ack(p) => &mut p.base,
            AprsPacket::Experimental(p) => &mut p.base,
            AprsPacket::Telemetry(p) => &mut p.base,
        }
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            AprsPacket::Position(_) => PacketType::Position,
            AprsPacket::Message(_) | AprsPacket::Ack(_) => PacketType::Message,
            AprsPacket::Experimental(_) => PacketType::Experimental,
            AprsPacket::Telemetry(p) => p.kind.packet_type(),
        }
    }

    /// Information field text
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            AprsPacket::Position(p) => p.encode(),
            AprsPacket::Message(p) => p.encode(),
            AprsPacket::Ack(p) => p.encode(),
            AprsPacket::Experimental(p) => p.encode(),
            AprsPacket::Telemetry(p) => p.encode(),
        }
    }

    /// Complete UI frame for this packet
    pub fn to_frame(&self) -> Result<Frame> {
        let information = self.encode()?;
        self.base().frame(&information)
    }

    /// NRZI line bits for this packet
    pub fn encode_bit_stream(&self) -> Result<BitBuffer> {
        let information = self.encode()?;
        self.base().encode_bit_stream(&information)
    }

    /// Decode the information field of a received frame
    ///
    /// `None` when the packet type is unknown or its text does not parse.
    pub fn from_frame(frame: &Frame) -> Option<AprsPacket> {
        let base = PacketBase::from_frame(frame);
        let information = frame.information();
        let packet_type = identify(information);

        let packet = match packet_type {
            PacketType::Position => PositionPacket::decode(base, information).map(AprsPacket::Position),
            PacketType::Message => {
                if MessageAck::looks_like_ack(information) {
                    MessageAck::decode(base, information).map(AprsPacket::Ack)
                } else {
                    MessagePacket::decode(base, information).map(AprsPacket::Message)
                }
            }
            PacketType::Experimental => {
                ExperimentalPacket::decode(base, information).map(AprsPacket::Experimental)
            }
            PacketType::Unknown => None,
            telemetry => telemetry
                .telemetry_kind()
                .and_then(|kind| TelemetryPacket::decode(base, kind, information))
                .map(AprsPacket::Telemetry),
        };

        if packet.is_none() {
            debug!(?packet_type, "APRS information field did not parse");
        }
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PacketBase {
        PacketBase::new("N0CALL", 1)
    }

    #[test]
    fn test_base_defaults() {
        let base = PacketBase::default();
        assert_eq!(base.destination, "APZMWV");
        assert_eq!(base.symbol_table, SymbolTable::Primary);
        assert_eq!(base.symbol, '/');
    }

    #[test]
    fn test_base_validation() {
        assert!(base().validate().is_ok());

        let mut bad = base();
        bad.source = "AB".into();
        assert!(matches!(bad.validate(), Err(CodecError::InvalidField { field: "source", .. })));

        let mut bad = base();
        bad.destination_ssid = 16;
        assert!(bad.validate().is_err());

        let mut bad = base();
        bad.symbol = ' ';
        assert!(matches!(bad.validate(), Err(CodecError::InvalidField { field: "symbol", .. })));
    }

    #[test]
    fn test_symbol_table_identifier() {
        assert_eq!(SymbolTable::Secondary.identifier(), b'\\');
        assert_eq!(SymbolTable::from_identifier(b'/'), Some(SymbolTable::Primary));
        assert_eq!(SymbolTable::from_identifier(b'x'), None);
    }

    #[test]
    fn test_identify() {
        assert_eq!(identify(b"@092345z/5L!!<*e7>7P[/A=000000"), PacketType::Position);
        assert_eq!(identify(b"/092345z"), PacketType::Position);
        assert_eq!(identify(b":N0CALL   :hello{1"), PacketType::Message);
        assert_eq!(identify(b":N0CALL-1 :PARM.x"), PacketType::TelemetryParameterName);
        assert_eq!(identify(b":N0CALL-1 :UNIT.x"), PacketType::TelemetryParameterUnit);
        assert_eq!(identify(b":N0CALL-1 :EQNS.0,1,0"), PacketType::TelemetryCoefficient);
        assert_eq!(identify(b":N0CALL-1 :BITS.11111111"), PacketType::TelemetryBitSense);
        assert_eq!(identify(b":N0CALL-1 :ABCD.x"), PacketType::Message);
        assert_eq!(identify(b"{{adata"), PacketType::Experimental);
        assert_eq!(identify(b"T#000,000"), PacketType::TelemetryDataReport);
        assert_eq!(identify(b"!4903.50N"), PacketType::Unknown);
        assert_eq!(identify(b""), PacketType::Unknown);
    }

    #[test]
    fn test_encode_frame_addresses() {
        let mut frame = base().frame(b"{{ahi").unwrap();
        assert_eq!(frame.source().callsign(), "N0CALL");
        assert_eq!(frame.source().ssid(), 1);
        assert_eq!(frame.destination().callsign(), "APZMWV");

        let bytes = frame.build_frame().unwrap();
        assert_eq!(&bytes[16..21], b"{{ahi");
        assert_eq!(base().encode_frame(b"{{ahi").unwrap(), bytes);
    }

    #[test]
    fn test_encode_frame_rejects_invalid_base() {
        let bad = PacketBase::new("TOOLONGCALL", 0);
        assert!(bad.encode_frame(b"x").is_err());
    }

    #[test]
    fn test_from_frame_dispatch() {
        let message = MessagePacket {
            base: base(),
            addressee: "KD9XYZ".into(),
            message: "hello".into(),
            message_id: "7".into(),
        };
        let packet = AprsPacket::Message(message.clone());
        let mut bits = packet.encode_bit_stream().unwrap();
        let frame = Frame::parse_bit_stream(&mut bits).unwrap();

        match AprsPacket::from_frame(&frame) {
            Some(AprsPacket::Message(decoded)) => {
                assert_eq!(decoded.addressee, "KD9XYZ");
                assert_eq!(decoded.message, "hello");
                assert_eq!(decoded.message_id, "7");
                assert_eq!(decoded.base.source, "N0CALL");
                assert_eq!(decoded.base.source_ssid, 1);
            }
            other => panic!("unexpected {:?}", other),
        }

        let ack = AprsPacket::Ack(MessageAck {
            base: base(),
            addressee: "KD9XYZ".into(),
            message_id: "7".into(),
        });
        let frame = ack.to_frame().unwrap();
        assert!(matches!(AprsPacket::from_frame(&frame), Some(AprsPacket::Ack(_))));
        assert_eq!(ack.packet_type(), PacketType::Message);
    }

    #[test]
    fn test_from_frame_unknown() {
        let frame = base().frame(b"!not supported").unwrap();
        assert_eq!(AprsPacket::from_frame(&frame), None);
    }
}
