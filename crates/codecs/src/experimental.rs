//! Experimental packets: `{{` + type character + raw data

use crate::packet::PacketBase;
use crate::{CodecError, Result};
use serde::{Deserialize, Serialize};

const EXPERIMENTAL_PREFIX: &[u8] = b"{{";
pub const MAX_EXPERIMENTAL_DATA_LENGTH: usize = 252;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentalPacket {
    pub base: PacketBase,
    pub packet_type: char,
    pub data: Vec<u8>,
}

impl Default for ExperimentalPacket {
    fn default() -> Self {
        Self {
            base: PacketBase::default(),
            packet_type: 'a',
            data: Vec::new(),
        }
    }
}

impl ExperimentalPacket {
    pub fn data_string(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    pub fn set_data_string(&mut self, data: &str) {
        self.data = data.as_bytes().to_vec();
    }

    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if !self.packet_type.is_ascii_graphic() {
            return Err(CodecError::field(
                "packet_type",
                format!("{:?} is not a printable character", self.packet_type),
            ));
        }
        if self.data.len() > MAX_EXPERIMENTAL_DATA_LENGTH {
            return Err(CodecError::field(
                "data",
                format!("{} bytes, at most {}", self.data.len(), MAX_EXPERIMENTAL_DATA_LENGTH),
            ));
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut info = Vec::with_capacity(3 + self.data.len());
        info.extend_from_slice(EXPERIMENTAL_PREFIX);
        info.push(self.packet_type as u8);
        info.extend_from_slice(&self.data);
        Ok(info)
    }

    pub fn decode(base: PacketBase, info: &[u8]) -> Option<Self> {
        if info.len() < 3 || !info.starts_with(EXPERIMENTAL_PREFIX) {
            return None;
        }
        Some(Self {
            base,
            packet_type: info[2] as char,
            data: info[3..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(data: &str) -> ExperimentalPacket {
        let mut packet = ExperimentalPacket {
            base: PacketBase::new("N0CALL", 2),
            packet_type: 'g',
            ..Default::default()
        };
        packet.set_data_string(data);
        packet
    }

    #[test]
    fn test_round_trip() {
        let original = packet("gps:12,alt:3000");
        let info = original.encode().unwrap();
        assert_eq!(info, b"{{ggps:12,alt:3000");
        let decoded = ExperimentalPacket::decode(original.base.clone(), &info).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.data_string(), "gps:12,alt:3000");
    }

    #[test]
    fn test_empty_data() {
        let decoded = ExperimentalPacket::decode(PacketBase::default(), b"{{z").unwrap();
        assert_eq!(decoded.packet_type, 'z');
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn test_rejections() {
        assert!(packet(&"d".repeat(253)).encode().is_err());
        assert!(packet(&"d".repeat(252)).encode().is_ok());
        assert!(ExperimentalPacket::decode(PacketBase::default(), b"{{").is_none());
        assert!(ExperimentalPacket::decode(PacketBase::default(), b"{x abc").is_none());

        let mut bad = packet("x");
        bad.packet_type = ' ';
        assert!(bad.encode().is_err());
    }
}
