//! Messages and acknowledgements
//!
//! `:ADDRESSEE:text{id` and `:ADDRESSEE:ackid`, addressee space padded to
//! nine characters.

use crate::packet::PacketBase;
use crate::{CodecError, Result};
use serde::{Deserialize, Serialize};

pub const ADDRESSEE_LENGTH: usize = 9;
pub const MAX_MESSAGE_LENGTH: usize = 67;
pub const MAX_MESSAGE_ID_LENGTH: usize = 5;

/// Characters a message body may not carry
const FORBIDDEN_MESSAGE_CHARACTERS: [char; 3] = ['|', '~', '{'];

const ACK_PREFIX: &[u8] = b"ack";

/// Length of `:ADDRESSEE:`
const HEADER_LENGTH: usize = ADDRESSEE_LENGTH + 2;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagePacket {
    pub base: PacketBase,
    pub addressee: String,
    pub message: String,
    /// Empty when no acknowledgement is requested
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageAck {
    pub base: PacketBase,
    pub addressee: String,
    pub message_id: String,
}

fn validate_addressee(addressee: &str) -> Result<()> {
    if addressee.is_empty() || addressee.len() > ADDRESSEE_LENGTH || !addressee.is_ascii() {
        return Err(CodecError::field(
            "addressee",
            format!("{:?} must be 1-{} ASCII characters", addressee, ADDRESSEE_LENGTH),
        ));
    }
    Ok(())
}

fn validate_message_id(id: &str, required: bool) -> Result<()> {
    let length_ok = if required {
        (1..=MAX_MESSAGE_ID_LENGTH).contains(&id.len())
    } else {
        id.len() <= MAX_MESSAGE_ID_LENGTH
    };
    if !length_ok || !id.bytes().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CodecError::field(
            "message_id",
            format!("{:?} must be up to {} alphanumeric characters", id, MAX_MESSAGE_ID_LENGTH),
        ));
    }
    Ok(())
}

/// `:` + addressee padded to nine + `:`
pub(crate) fn addressee_header(addressee: &str) -> Vec<u8> {
    format!(":{:<width$}:", addressee, width = ADDRESSEE_LENGTH).into_bytes()
}

/// Split `:ADDRESSEE:rest` into the trimmed addressee and the rest
pub(crate) fn split_addressee(info: &[u8]) -> Option<(String, &[u8])> {
    if info.len() < HEADER_LENGTH || info[0] != b':' || info[HEADER_LENGTH - 1] != b':' {
        return None;
    }
    let addressee = std::str::from_utf8(&info[1..HEADER_LENGTH - 1]).ok()?;
    Some((addressee.trim_end().to_string(), &info[HEADER_LENGTH..]))
}

impl MessagePacket {
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        validate_addressee(&self.addressee)?;
        if self.message.len() > MAX_MESSAGE_LENGTH
            || !self.message.is_ascii()
            || self.message.contains(FORBIDDEN_MESSAGE_CHARACTERS)
        {
            return Err(CodecError::field(
                "message",
                format!("at most {} ASCII characters, none of | ~ {{", MAX_MESSAGE_LENGTH),
            ));
        }
        validate_message_id(&self.message_id, false)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut info = addressee_header(&self.addressee);
        info.extend_from_slice(self.message.as_bytes());
        if !self.message_id.is_empty() {
            info.push(b'{');
            info.extend_from_slice(self.message_id.as_bytes());
        }
        Ok(info)
    }

    /// Parse a message; the `{id` suffix is optional
    pub fn decode(base: PacketBase, info: &[u8]) -> Option<Self> {
        let (addressee, content) = split_addressee(info)?;
        let content = std::str::from_utf8(content).ok()?;
        let (message, message_id) = match content.split_once('{') {
            Some((message, id)) => (message, id),
            None => (content, ""),
        };
        Some(Self {
            base,
            addressee,
            message: message.to_string(),
            message_id: message_id.to_string(),
        })
    }
}

impl MessageAck {
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        validate_addressee(&self.addressee)?;
        validate_message_id(&self.message_id, true)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut info = addressee_header(&self.addressee);
        info.extend_from_slice(ACK_PREFIX);
        info.extend_from_slice(self.message_id.as_bytes());
        Ok(info)
    }

    /// Whether a message-format field carries an acknowledgement
    pub fn looks_like_ack(info: &[u8]) -> bool {
        split_addressee(info).is_some_and(|(_, content)| {
            content.starts_with(ACK_PREFIX)
                && (ACK_PREFIX.len() + 1..=ACK_PREFIX.len() + MAX_MESSAGE_ID_LENGTH)
                    .contains(&content.len())
                && content[ACK_PREFIX.len()..].iter().all(u8::is_ascii_alphanumeric)
        })
    }

    pub fn decode(base: PacketBase, info: &[u8]) -> Option<Self> {
        if !Self::looks_like_ack(info) {
            return None;
        }
        let (addressee, content) = split_addressee(info)?;
        let message_id = std::str::from_utf8(&content[ACK_PREFIX.len()..]).ok()?;
        Some(Self {
            base,
            addressee,
            message_id: message_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str, id: &str) -> MessagePacket {
        MessagePacket {
            base: PacketBase::new("N0CALL", 0),
            addressee: "KD9XYZ-3".into(),
            message: text.into(),
            message_id: id.into(),
        }
    }

    #[test]
    fn test_message_encoding() {
        assert_eq!(message("hello world", "42").encode().unwrap(), b":KD9XYZ-3 :hello world{42");
        assert_eq!(message("no ack", "").encode().unwrap(), b":KD9XYZ-3 :no ack");
    }

    #[test]
    fn test_message_round_trip() {
        let packet = message("status ok", "A1");
        let decoded = MessagePacket::decode(packet.base.clone(), &packet.encode().unwrap()).unwrap();
        assert_eq!(decoded, packet);

        let packet = message("", "");
        let decoded = MessagePacket::decode(packet.base.clone(), &packet.encode().unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_message_validation() {
        assert!(message("pipe | here", "").encode().is_err());
        assert!(message("tilde ~", "").encode().is_err());
        assert!(message("brace {", "").encode().is_err());
        assert!(message(&"x".repeat(68), "").encode().is_err());
        assert!(message(&"x".repeat(67), "").encode().is_ok());
        assert!(message("hi", "123456").encode().is_err());
        assert!(message("hi", "1-2").encode().is_err());

        let mut packet = message("hi", "");
        packet.addressee = "TENLETTERS".into();
        assert!(packet.encode().is_err());
        packet.addressee = String::new();
        assert!(packet.encode().is_err());
    }

    #[test]
    fn test_message_decode_rejects_bad_header() {
        let base = PacketBase::default();
        assert!(MessagePacket::decode(base.clone(), b":SHORT:").is_none());
        assert!(MessagePacket::decode(base, b":KD9XYZ-3 xhello").is_none());
    }

    #[test]
    fn test_ack_round_trip() {
        let ack = MessageAck {
            base: PacketBase::new("N0CALL", 0),
            addressee: "KD9XYZ".into(),
            message_id: "42".into(),
        };
        let info = ack.encode().unwrap();
        assert_eq!(info, b":KD9XYZ   :ack42");
        assert!(MessageAck::looks_like_ack(&info));
        assert_eq!(MessageAck::decode(ack.base.clone(), &info).unwrap(), ack);
    }

    #[test]
    fn test_ack_detection() {
        assert!(!MessageAck::looks_like_ack(b":KD9XYZ   :ack"));
        assert!(!MessageAck::looks_like_ack(b":KD9XYZ   :acknowledged receipt"));
        assert!(!MessageAck::looks_like_ack(b":KD9XYZ   :hello{1"));

        let ack = MessageAck {
            base: PacketBase::new("N0CALL", 0),
            addressee: "KD9XYZ".into(),
            message_id: String::new(),
        };
        assert!(ack.encode().is_err());
    }
}
