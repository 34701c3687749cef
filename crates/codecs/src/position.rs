//! Compressed position reports
//!
//! ```text
//! @hhmmssz T YYYY XXXX $ c s t /A=aaaaaa comment
//! ```
//!
//! `T` is the symbol table, `YYYY`/`XXXX` base-91 latitude/longitude, `$` the
//! symbol, `c` course, `s` speed and `t` the compression type byte.

use crate::base91;
use crate::packet::{PacketBase, SymbolTable};
use crate::{CodecError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const LATITUDE_SCALE: f64 = 380_926.0;
const LONGITUDE_SCALE: f64 = 190_463.0;
const SPEED_LOG_DIVISOR: f64 = 0.076961;

/// Offset applied to course and speed bytes
const PRINTABLE_OFFSET: u8 = 33;

/// Compression type: current fix, other source, software origin
const COMPRESSION_TYPE: u8 = 0b0011_1010 + PRINTABLE_OFFSET;

const ALTITUDE_PREFIX: &[u8] = b"/A=";

/// Everything up to and including the altitude digits
const FIXED_LENGTH: usize = 30;

const MIN_ALTITUDE_FEET: i32 = -1_400;
const MAX_ALTITUDE_FEET: i32 = 150_000;
const MAX_SPEED_KNOTS: f64 = 400.0;
const MAX_COURSE_DEGREES: u16 = 360;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionPacket {
    pub base: PacketBase,
    /// `hhmmss`, UTC
    pub time_code: String,
    /// Decimal degrees, north positive
    pub latitude: f64,
    /// Decimal degrees, east positive
    pub longitude: f64,
    /// Feet
    pub altitude: i32,
    /// Knots
    pub speed: f64,
    /// Degrees
    pub course: u16,
    pub comment: String,
    /// Set when the packet is decoded from a frame
    pub decoded_at: Option<DateTime<Utc>>,
}

impl PositionPacket {
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if !valid_time_code(&self.time_code) {
            return Err(CodecError::field("time_code", format!("{:?} is not hhmmss", self.time_code)));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(CodecError::field("latitude", format!("{} out of range", self.latitude)));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(CodecError::field("longitude", format!("{} out of range", self.longitude)));
        }
        if !(MIN_ALTITUDE_FEET..=MAX_ALTITUDE_FEET).contains(&self.altitude) {
            return Err(CodecError::field("altitude", format!("{} ft out of range", self.altitude)));
        }
        if !(0.0..=MAX_SPEED_KNOTS).contains(&self.speed) {
            return Err(CodecError::field("speed", format!("{} kt out of range", self.speed)));
        }
        if self.course > MAX_COURSE_DEGREES {
            return Err(CodecError::field("course", format!("{} out of range", self.course)));
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;

        let mut info = Vec::with_capacity(FIXED_LENGTH + self.comment.len());
        info.push(b'@');
        info.extend_from_slice(self.time_code.as_bytes());
        info.push(b'z');
        info.push(self.base.symbol_table.identifier());

        let latitude = (LATITUDE_SCALE * (90.0 - self.latitude)).round() as u32;
        info.extend(base91::encode(latitude, 4)?);
        let longitude = (LONGITUDE_SCALE * (180.0 + self.longitude)).round() as u32;
        info.extend(base91::encode(longitude, 4)?);

        info.push(self.base.symbol as u8);
        info.push((self.course / 4) as u8 + PRINTABLE_OFFSET);
        let speed = if self.speed > 0.0 {
            ((self.speed + 1.0).ln() / SPEED_LOG_DIVISOR).round() as u8
        } else {
            0
        };
        info.push(speed + PRINTABLE_OFFSET);
        info.push(COMPRESSION_TYPE);

        info.extend_from_slice(ALTITUDE_PREFIX);
        let altitude = if self.altitude < 0 {
            format!("-{:05}", -self.altitude)
        } else {
            format!("{:06}", self.altitude)
        };
        info.extend_from_slice(altitude.as_bytes());
        info.extend_from_slice(self.comment.as_bytes());
        Ok(info)
    }

    /// Parse a compressed position report; `None` when it does not match
    pub fn decode(base: PacketBase, info: &[u8]) -> Option<Self> {
        if info.len() < FIXED_LENGTH || !matches!(info[0], b'@' | b'/') {
            return None;
        }

        let time_code = std::str::from_utf8(&info[1..7]).ok()?.to_string();
        let symbol_table = SymbolTable::from_identifier(info[8])?;
        let latitude = 90.0 - base91::decode(&info[9..13])? as f64 / LATITUDE_SCALE;
        let longitude = base91::decode(&info[13..17])? as f64 / LONGITUDE_SCALE - 180.0;
        let symbol = info[17] as char;
        let course = info[18].checked_sub(PRINTABLE_OFFSET)? as u16 * 4;
        let speed_code = info[19].checked_sub(PRINTABLE_OFFSET)?;
        let speed = (speed_code as f64 * SPEED_LOG_DIVISOR).exp() - 1.0;
        if info[20] < PRINTABLE_OFFSET || &info[21..24] != ALTITUDE_PREFIX {
            return None;
        }
        let altitude = std::str::from_utf8(&info[24..FIXED_LENGTH]).ok()?.parse().ok()?;
        let comment = String::from_utf8_lossy(&info[FIXED_LENGTH..]).into_owned();

        Some(Self {
            base: PacketBase {
                symbol_table,
                symbol,
                ..base
            },
            time_code,
            latitude,
            longitude,
            altitude,
            speed,
            course,
            comment,
            decoded_at: Some(Utc::now()),
        })
    }
}

fn valid_time_code(time_code: &str) -> bool {
    let bytes = time_code.as_bytes();
    if bytes.len() != 6 || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let field = |i: usize| (bytes[i] - b'0') * 10 + (bytes[i + 1] - b'0');
    field(0) < 24 && field(2) < 60 && field(4) < 60
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PositionPacket {
        PositionPacket {
            base: PacketBase::new("N0CALL", 11),
            time_code: "092345".into(),
            latitude: 49.5,
            longitude: -72.75,
            altitude: 1234,
            speed: 36.2,
            course: 88,
            comment: "balloon".into(),
            decoded_at: None,
        }
    }

    #[test]
    fn test_encode_layout() {
        let info = sample().encode().unwrap();
        assert_eq!(&info[..9], b"@092345z/");
        assert_eq!(info[17], b'/');
        assert_eq!(info[18], 88 / 4 + 33);
        assert_eq!(info[20], b'[');
        assert_eq!(&info[21..30], b"/A=001234");
        assert_eq!(&info[30..], b"balloon");
    }

    #[test]
    fn test_round_trip() {
        let packet = sample();
        let info = packet.encode().unwrap();
        let decoded = PositionPacket::decode(PacketBase::new("N0CALL", 11), &info).unwrap();

        assert_eq!(decoded.time_code, "092345");
        assert!((decoded.latitude - 49.5).abs() < 1e-5);
        assert!((decoded.longitude + 72.75).abs() < 1e-5);
        assert_eq!(decoded.altitude, 1234);
        assert_eq!(decoded.course, 88);
        // speed is quantised logarithmically
        assert!((decoded.speed - 36.2).abs() / 36.2 < 0.04);
        assert_eq!(decoded.comment, "balloon");
        assert!(decoded.decoded_at.is_some());
    }

    #[test]
    fn test_extremes() {
        for (lat, lon) in [(90.0, -180.0), (-90.0, 180.0), (0.0, 0.0)] {
            let packet = PositionPacket { latitude: lat, longitude: lon, ..sample() };
            let decoded = PositionPacket::decode(PacketBase::default(), &packet.encode().unwrap()).unwrap();
            assert!((decoded.latitude - lat).abs() < 1e-5);
            assert!((decoded.longitude - lon).abs() < 1e-5);
        }
    }

    #[test]
    fn test_zero_speed_and_negative_altitude() {
        let packet = PositionPacket { speed: 0.0, altitude: -1400, ..sample() };
        let info = packet.encode().unwrap();
        assert_eq!(info[19], 33);
        assert_eq!(&info[21..30], b"/A=-01400");

        let decoded = PositionPacket::decode(PacketBase::default(), &info).unwrap();
        assert_eq!(decoded.speed, 0.0);
        assert_eq!(decoded.altitude, -1400);
    }

    #[test]
    fn test_secondary_table() {
        let mut packet = sample();
        packet.base.symbol_table = SymbolTable::Secondary;
        packet.base.symbol = 'O';
        let decoded = PositionPacket::decode(PacketBase::default(), &packet.encode().unwrap()).unwrap();
        assert_eq!(decoded.base.symbol_table, SymbolTable::Secondary);
        assert_eq!(decoded.base.symbol, 'O');
    }

    #[test]
    fn test_short_comment_tolerated() {
        let packet = PositionPacket { comment: String::new(), ..sample() };
        let info = packet.encode().unwrap();
        assert_eq!(info.len(), 30);
        let decoded = PositionPacket::decode(PacketBase::default(), &info).unwrap();
        assert_eq!(decoded.comment, "");

        assert!(PositionPacket::decode(PacketBase::default(), &info[..29]).is_none());
    }

    #[test]
    fn test_validation() {
        let invalid = [
            PositionPacket { time_code: "12345".into(), ..sample() },
            PositionPacket { time_code: "246000".into(), ..sample() },
            PositionPacket { time_code: "12a456".into(), ..sample() },
            PositionPacket { latitude: 90.1, ..sample() },
            PositionPacket { longitude: -180.5, ..sample() },
            PositionPacket { altitude: 150_001, ..sample() },
            PositionPacket { speed: 401.0, ..sample() },
            PositionPacket { course: 361, ..sample() },
        ];
        for packet in invalid {
            assert!(packet.encode().is_err(), "{:?}", packet);
        }
        assert!(PositionPacket { course: 360, ..sample() }.encode().is_ok());
    }

    #[test]
    fn test_malformed_rejected() {
        let mut info = sample().encode().unwrap();
        info[8] = b'x';
        assert!(PositionPacket::decode(PacketBase::default(), &info).is_none());

        let mut info = sample().encode().unwrap();
        info[22] = b'B';
        assert!(PositionPacket::decode(PacketBase::default(), &info).is_none());
    }
}
