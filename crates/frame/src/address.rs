//! AX.25 station addresses
//!
//! Callsign characters are ASCII shifted left one bit and space padded to
//! six bytes. The seventh byte packs the SSID with the command/response bit,
//! two reserved bits and the address-extension ("last address") bit.

use crate::{FrameError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_CALLSIGN_LENGTH: usize = 3;
pub const MAX_CALLSIGN_LENGTH: usize = 6;
pub const MAX_SSID: u8 = 15;

/// Encoded size of one address
pub const ADDRESS_LENGTH: usize = 7;

const COMMAND_RESPONSE_BIT: u8 = 0x80;
const RESERVED_BIT_1: u8 = 0x40;
const RESERVED_BIT_2: u8 = 0x20;
const LAST_ADDRESS_BIT: u8 = 0x01;

/// Callsign plus SSID and the flag bits carried in the SSID byte
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    callsign: String,
    ssid: u8,
    command_response: bool,
    reserved_bit_1: bool,
    reserved_bit_2: bool,
    last: bool,
}

impl Address {
    /// Create an address, validating callsign and SSID
    ///
    /// Lowercase letters are accepted and stored uppercase.
    pub fn new(callsign: &str, ssid: u8) -> Result<Self> {
        if !is_valid_callsign(callsign) {
            return Err(FrameError::InvalidCallsign {
                callsign: callsign.to_string(),
            });
        }

        if ssid > MAX_SSID {
            return Err(FrameError::InvalidSsid { ssid });
        }

        Ok(Self {
            callsign: callsign.to_ascii_uppercase(),
            ssid,
            command_response: true,
            reserved_bit_1: true,
            reserved_bit_2: true,
            last: false,
        })
    }

    pub fn callsign(&self) -> &str {
        &self.callsign
    }

    pub fn ssid(&self) -> u8 {
        self.ssid
    }

    /// Address-extension bit: set on the final address of the chain
    pub fn is_last(&self) -> bool {
        self.last
    }

    pub fn set_last(&mut self, last: bool) {
        self.last = last;
    }

    /// Command/response bit, also the "has been repeated" bit on repeaters
    pub fn command_response(&self) -> bool {
        self.command_response
    }

    pub fn set_command_response(&mut self, value: bool) {
        self.command_response = value;
    }

    pub fn reserved_bits(&self) -> (bool, bool) {
        (self.reserved_bit_1, self.reserved_bit_2)
    }

    /// Encode into the seven on-air bytes
    pub fn encode(&self) -> [u8; ADDRESS_LENGTH] {
        let mut bytes = [b' ' << 1; ADDRESS_LENGTH];
        for (slot, ch) in bytes.iter_mut().zip(self.callsign.bytes()) {
            *slot = ch << 1;
        }

        let mut ssid_byte = self.ssid << 1;
        if self.command_response {
            ssid_byte |= COMMAND_RESPONSE_BIT;
        }
        if self.reserved_bit_1 {
            ssid_byte |= RESERVED_BIT_1;
        }
        if self.reserved_bit_2 {
            ssid_byte |= RESERVED_BIT_2;
        }
        if self.last {
            ssid_byte |= LAST_ADDRESS_BIT;
        }
        bytes[ADDRESS_LENGTH - 1] = ssid_byte;

        bytes
    }

    /// Decode seven on-air bytes; `None` if they do not hold a valid address
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ADDRESS_LENGTH {
            return None;
        }

        let chars: Vec<u8> = bytes[..MAX_CALLSIGN_LENGTH].iter().map(|b| b >> 1).collect();
        let length = chars.iter().position(|&c| c == b' ').unwrap_or(MAX_CALLSIGN_LENGTH);
        if chars[length..].iter().any(|&c| c != b' ') {
            return None;
        }

        let callsign = std::str::from_utf8(&chars[..length]).ok()?;
        if !is_valid_callsign(callsign) {
            return None;
        }

        let ssid_byte = bytes[ADDRESS_LENGTH - 1];
        Some(Self {
            callsign: callsign.to_ascii_uppercase(),
            ssid: (ssid_byte >> 1) & MAX_SSID,
            command_response: ssid_byte & COMMAND_RESPONSE_BIT != 0,
            reserved_bit_1: ssid_byte & RESERVED_BIT_1 != 0,
            reserved_bit_2: ssid_byte & RESERVED_BIT_2 != 0,
            last: ssid_byte & LAST_ADDRESS_BIT != 0,
        })
    }
}

/// 3-6 ASCII alphanumeric characters
pub fn is_valid_callsign(callsign: &str) -> bool {
    (MIN_CALLSIGN_LENGTH..=MAX_CALLSIGN_LENGTH).contains(&callsign.len())
        && callsign.bytes().all(|c| c.is_ascii_alphanumeric())
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid > 0 {
            write!(f, "{}-{}", self.callsign, self.ssid)
        } else {
            write!(f, "{}", self.callsign)
        }
    }
}

impl FromStr for Address {
    type Err = FrameError;

    /// Parse `CALL` or `CALL-SSID`
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('-') {
            Some((callsign, ssid)) => {
                let ssid = ssid.parse::<u8>().map_err(|_| FrameError::InvalidCallsign {
                    callsign: s.to_string(),
                })?;
                Address::new(callsign, ssid)
            }
            None => Address::new(s, 0),
        }
    }
}
