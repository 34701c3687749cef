//! AX.25 Unnumbered-Information frames
//!
//! ```text
//! | flags | dest (7) | src (7) | repeaters (0-14) | ctrl | pid | info (1-256) | fcs (2) | flags |
//! ```
//!
//! Everything between the flags is bit-stuffed and sent LSB first; the whole
//! stream, flags included, is NRZI line coded.

use crate::address::{Address, ADDRESS_LENGTH};
use crate::fcs::{calculate_fcs, fcs_bytes};
use crate::hdlc::{self, FLAG};
use crate::{FrameError, FrameRejection, Result};
use packetmodem_core::bitstream::BitBuffer;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Control byte of an Unnumbered-Information frame
pub const CONTROL_UI: u8 = 0x03;

/// Protocol id: no layer 3
pub const PID_NO_LAYER_3: u8 = 0xF0;

pub const MAX_REPEATERS: usize = 2;
pub const MAX_INFORMATION_LENGTH: usize = 256;

/// Flags sent ahead of the frame body
pub const PREAMBLE_FLAGS: usize = 33;

/// Flags sent after the frame body
pub const POSTAMBLE_FLAGS: usize = 4;

/// Smallest destuffed frame accepted by the parser
pub const MIN_FRAME_LENGTH: usize = 20;

/// Consecutive flags needed to accept synchronisation
pub const MIN_SYNC_FLAGS: usize = 2;

/// An AX.25 UI frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    destination: Address,
    source: Address,
    repeaters: Vec<Address>,
    control: u8,
    pid: u8,
    information: Vec<u8>,
    fcs: u16,
    #[serde(skip)]
    built: bool,
}

impl Frame {
    /// Create a frame with no repeaters and an empty information field
    pub fn new(destination: Address, source: Address) -> Self {
        Self {
            destination,
            source,
            repeaters: Vec::new(),
            control: CONTROL_UI,
            pid: PID_NO_LAYER_3,
            information: Vec::new(),
            fcs: 0,
            built: false,
        }
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }

    pub fn set_destination(&mut self, address: Address) {
        self.destination = address;
    }

    pub fn source(&self) -> &Address {
        &self.source
    }

    pub fn set_source(&mut self, address: Address) {
        self.source = address;
    }

    pub fn repeaters(&self) -> &[Address] {
        &self.repeaters
    }

    /// Append a repeater to the address chain
    pub fn add_repeater(&mut self, address: Address) -> Result<()> {
        if self.repeaters.len() >= MAX_REPEATERS {
            return Err(FrameError::TooManyRepeaters { max: MAX_REPEATERS });
        }
        self.repeaters.push(address);
        Ok(())
    }

    pub fn information(&self) -> &[u8] {
        &self.information
    }

    pub fn set_information(&mut self, information: impl Into<Vec<u8>>) -> Result<()> {
        let information = information.into();
        if information.len() > MAX_INFORMATION_LENGTH {
            return Err(FrameError::InformationTooLong {
                length: information.len(),
                max: MAX_INFORMATION_LENGTH,
            });
        }
        self.information = information;
        Ok(())
    }

    pub fn control(&self) -> u8 {
        self.control
    }

    pub fn pid(&self) -> u8 {
        self.pid
    }

    /// FCS computed by [`build_frame`](Frame::build_frame) or received on parse
    pub fn fcs(&self) -> u16 {
        self.fcs
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Serialize addresses, control, PID, information and FCS (no flags)
    ///
    /// Sets the address-extension bit on the final address of the chain.
    /// A frame can only be built once.
    pub fn build_frame(&mut self) -> Result<Vec<u8>> {
        if self.built {
            return Err(FrameError::AlreadyBuilt);
        }
        if self.information.is_empty() {
            return Err(FrameError::EmptyInformation);
        }

        self.destination.set_last(false);
        self.source.set_last(self.repeaters.is_empty());
        let repeater_count = self.repeaters.len();
        for (i, repeater) in self.repeaters.iter_mut().enumerate() {
            repeater.set_last(i + 1 == repeater_count);
        }

        let mut bytes = Vec::with_capacity(
            ADDRESS_LENGTH * (2 + repeater_count) + 4 + self.information.len(),
        );
        bytes.extend_from_slice(&self.destination.encode());
        bytes.extend_from_slice(&self.source.encode());
        for repeater in &self.repeaters {
            bytes.extend_from_slice(&repeater.encode());
        }
        bytes.push(self.control);
        bytes.push(self.pid);
        bytes.extend_from_slice(&self.information);

        self.fcs = calculate_fcs(&bytes);
        bytes.extend_from_slice(&fcs_bytes(self.fcs));

        self.built = true;
        Ok(bytes)
    }

    /// Build, stuff, add flags and NRZI-encode, returning the line bits
    pub fn encode_bit_stream(&mut self) -> Result<BitBuffer> {
        let body = self.build_frame()?;

        let mut bits = BitBuffer::new();
        hdlc::add_flags(&mut bits, PREAMBLE_FLAGS);
        let stuffed = hdlc::stuff_bytes(&mut bits, &body);
        hdlc::add_flags(&mut bits, POSTAMBLE_FLAGS);
        while bits.total_bits() % 8 != 0 {
            bits.add_one_bit();
        }
        bits.flush();

        debug!(
            bytes = body.len(),
            stuffed,
            "encoded AX.25 frame {}",
            self
        );

        Ok(hdlc::nrzi_encode(&mut bits))
    }

    /// [`encode_bit_stream`](Frame::encode_bit_stream) packed MSB-first into bytes
    pub fn encode_frame(&mut self) -> Result<Vec<u8>> {
        Ok(self.encode_bit_stream()?.to_bytes())
    }

    /// Recover a frame from NRZI line bits
    ///
    /// Consumes `bits` up to the end of the first frame found.
    pub fn parse_bit_stream(bits: &mut BitBuffer) -> std::result::Result<Frame, FrameRejection> {
        let mut decoded = hdlc::nrzi_decode(bits);

        let mut flags_found = 0;
        loop {
            match decoded.peek_next_byte() {
                Some(FLAG) => {
                    let mut run = 0;
                    while decoded.peek_next_byte() == Some(FLAG) {
                        decoded.skip_bits(8);
                        run += 1;
                    }
                    if run >= MIN_SYNC_FLAGS {
                        break;
                    }
                    flags_found = flags_found.max(run);
                }
                Some(_) => decoded.skip_bits(1),
                None if flags_found > 0 => {
                    return Err(FrameRejection::TooFewFlags { found: flags_found })
                }
                None => return Err(FrameRejection::NoFlagSync),
            }
        }

        let body = hdlc::destuff(&mut decoded).ok_or(FrameRejection::Unterminated)?;
        Frame::parse_bytes(&body)
    }

    /// Parse a destuffed frame body (addresses through FCS)
    pub fn parse_bytes(body: &[u8]) -> std::result::Result<Frame, FrameRejection> {
        if body.len() < MIN_FRAME_LENGTH {
            return Err(FrameRejection::TooShort { length: body.len() });
        }

        let destination = Address::decode(&body[..ADDRESS_LENGTH]).ok_or(FrameRejection::BadAddress)?;

        let mut offset = ADDRESS_LENGTH;
        let mut chain = Vec::with_capacity(1 + MAX_REPEATERS);
        loop {
            if chain.len() > MAX_REPEATERS {
                return Err(FrameRejection::BadAddress);
            }
            let end = offset + ADDRESS_LENGTH;
            if end + 4 > body.len() {
                return Err(FrameRejection::TooShort { length: body.len() });
            }
            let address = Address::decode(&body[offset..end]).ok_or(FrameRejection::BadAddress)?;
            offset = end;
            let last = address.is_last();
            chain.push(address);
            if last {
                break;
            }
        }

        let control = body[offset];
        if control != CONTROL_UI {
            return Err(FrameRejection::BadControl { value: control });
        }
        let pid = body[offset + 1];
        if pid != PID_NO_LAYER_3 {
            return Err(FrameRejection::BadPid { value: pid });
        }

        let fcs_offset = body.len() - 2;
        let received = u16::from_le_bytes([body[fcs_offset], body[fcs_offset + 1]]);
        let computed = calculate_fcs(&body[..fcs_offset]);
        if received != computed {
            return Err(FrameRejection::BadFcs { received, computed });
        }

        let mut chain = chain.into_iter();
        let source = chain.next().ok_or(FrameRejection::BadAddress)?;

        Ok(Frame {
            destination,
            source,
            repeaters: chain.collect(),
            control,
            pid,
            information: body[offset + 2..fcs_offset].to_vec(),
            fcs: received,
            built: false,
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}", self.source, self.destination)?;
        for repeater in &self.repeaters {
            write!(f, ",{}", repeater)?;
        }
        write!(f, ":{}", String::from_utf8_lossy(&self.information))
    }
}

/// Fluent construction of a frame ready to build
#[derive(Debug, Clone, Default)]
pub struct FrameBuilder {
    destination: Option<Address>,
    source: Option<Address>,
    repeaters: Vec<Address>,
    information: Vec<u8>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn destination(mut self, address: Address) -> Self {
        self.destination = Some(address);
        self
    }

    pub fn source(mut self, address: Address) -> Self {
        self.source = Some(address);
        self
    }

    pub fn repeater(mut self, address: Address) -> Self {
        self.repeaters.push(address);
        self
    }

    pub fn information(mut self, information: impl Into<Vec<u8>>) -> Self {
        self.information = information.into();
        self
    }

    /// Assemble the frame, checking every field limit
    pub fn build(self) -> Result<Frame> {
        let destination = self.destination.ok_or_else(|| FrameError::InvalidCallsign {
            callsign: "<missing destination>".to_string(),
        })?;
        let source = self.source.ok_or_else(|| FrameError::InvalidCallsign {
            callsign: "<missing source>".to_string(),
        })?;

        let mut frame = Frame::new(destination, source);
        for repeater in self.repeaters {
            frame.add_repeater(repeater)?;
        }
        frame.set_information(self.information)?;
        Ok(frame)
    }
}
